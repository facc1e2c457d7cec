//! Command line: `duplex <local port> <remote host> <remote port>`.

use std::net::{SocketAddr, ToSocketAddrs};

pub const USAGE: &str = "usage: duplex <local port> <remote machine name> <remote port>";

const MIN_PORT: u16 = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatArgs {
    pub local_port: u16,
    pub remote_host: String,
    pub remote_port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Chat(ChatArgs),
    Version,
    Help,
}

#[derive(Debug, thiserror::Error)]
pub enum ArgsError {
    #[error("expected 3 arguments, got {0}")]
    Count(usize),
    #[error("invalid {which} port {value:?} (1024 - 65535)")]
    Port { which: &'static str, value: String },
    #[error("invalid remote address {host:?}")]
    Resolve {
        host: String,
        #[source]
        source: Option<std::io::Error>,
    },
}

/// Parse arguments (program name already skipped).
pub fn parse<I>(args: I) -> Result<Command, ArgsError>
where
    I: IntoIterator<Item = String>,
{
    let args: Vec<String> = args.into_iter().collect();
    for arg in &args {
        match arg.as_str() {
            "--version" | "-V" => return Ok(Command::Version),
            "--help" | "-h" => return Ok(Command::Help),
            _ => {}
        }
    }
    let [local, host, remote] = args.as_slice() else {
        return Err(ArgsError::Count(args.len()));
    };
    Ok(Command::Chat(ChatArgs {
        local_port: parse_port("local", local)?,
        remote_host: host.clone(),
        remote_port: parse_port("remote", remote)?,
    }))
}

fn parse_port(which: &'static str, value: &str) -> Result<u16, ArgsError> {
    match value.parse::<u16>() {
        Ok(p) if p >= MIN_PORT => Ok(p),
        _ => Err(ArgsError::Port {
            which,
            value: value.to_string(),
        }),
    }
}

/// Resolve the peer. IPv4 is preferred because the local socket binds `0.0.0.0`.
pub fn resolve_peer(host: &str, port: u16) -> Result<SocketAddr, ArgsError> {
    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|e| ArgsError::Resolve {
            host: host.to_string(),
            source: Some(e),
        })?
        .collect();
    addrs
        .iter()
        .find(|a| a.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
        .ok_or_else(|| ArgsError::Resolve {
            host: host.to_string(),
            source: None,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_chat_arguments() {
        let cmd = parse(args(&["5000", "localhost", "5001"])).unwrap();
        assert_eq!(
            cmd,
            Command::Chat(ChatArgs {
                local_port: 5000,
                remote_host: "localhost".into(),
                remote_port: 5001,
            })
        );
    }

    #[test]
    fn flags_win_over_positionals() {
        assert_eq!(parse(args(&["-V"])).unwrap(), Command::Version);
        assert_eq!(parse(args(&["5000", "--help"])).unwrap(), Command::Help);
    }

    #[test]
    fn wrong_count() {
        assert!(matches!(parse(args(&["5000"])), Err(ArgsError::Count(1))));
        assert!(matches!(parse(Vec::new()), Err(ArgsError::Count(0))));
    }

    #[test]
    fn port_bounds() {
        assert!(matches!(
            parse(args(&["1023", "h", "5001"])),
            Err(ArgsError::Port { which: "local", .. })
        ));
        assert!(matches!(
            parse(args(&["5000", "h", "65536"])),
            Err(ArgsError::Port { which: "remote", .. })
        ));
        assert!(matches!(
            parse(args(&["5000", "h", "x"])),
            Err(ArgsError::Port { which: "remote", .. })
        ));
        assert!(parse(args(&["1024", "h", "65535"])).is_ok());
    }

    #[test]
    fn resolves_literal_address() {
        let addr = resolve_peer("127.0.0.1", 5001).unwrap();
        assert_eq!(addr, "127.0.0.1:5001".parse().unwrap());
    }

    #[test]
    fn bad_host_is_error() {
        assert!(matches!(
            resolve_peer("no such host.invalid", 5001),
            Err(ArgsError::Resolve { .. })
        ));
    }
}
