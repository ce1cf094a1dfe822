// User command parser.
//
// Translates one line of input into a `Command`. Malformed input becomes a
// usage hint for the caller to print; it never reaches the node state.

use ndn_common::wire::{NetId, NodeAddr, ObjectName};

pub const HELP: &str = "\
available commands:
  join (j) <net>                 join a network
  direct join (dj) <ip> <port>   connect to a node directly; 0.0.0.0 0 creates net 000
  create (c) <name>              publish an object
  delete (dl) <name>             remove a published object
  retrieve (r) <name>            search the overlay for an object
  show topology (st)             list neighbors
  show names (sn)                list local and cached objects
  show interest table (si)       list pending interests
  leave (l)                      leave the current network
  exit (x)                       shut down
  help                           show this help";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Join(NetId),
    DirectJoin(NodeAddr),
    Create(ObjectName),
    Delete(ObjectName),
    Retrieve(ObjectName),
    ShowTopology,
    ShowNames,
    ShowInterestTable,
    Leave,
    Exit,
}

/// Parses one input line. The error is the hint to print back.
pub fn parse(line: &str) -> Result<Command, String> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let Some(&verb) = tokens.first() else {
        return Err("empty command; type 'help' for the command list".into());
    };
    match verb {
        "help" => Ok(Command::Help),
        "join" | "j" => match tokens.as_slice() {
            [_, net] => net
                .parse::<NetId>()
                .map(Command::Join)
                .map_err(|err| format!("{err}\nusage: join (j) <net>")),
            _ => Err("usage: join (j) <net>".into()),
        },
        "direct" => match tokens.as_slice() {
            [_, "join", ip, port] => parse_target(ip, port),
            _ => Err("usage: direct join (dj) <ip> <port>".into()),
        },
        "dj" => match tokens.as_slice() {
            [_, ip, port] => parse_target(ip, port),
            _ => Err("usage: direct join (dj) <ip> <port>".into()),
        },
        "create" | "c" => named(&tokens, "create (c) <name>", Command::Create),
        "delete" | "dl" => named(&tokens, "delete (dl) <name>", Command::Delete),
        "retrieve" | "r" => named(&tokens, "retrieve (r) <name>", Command::Retrieve),
        "show" => match tokens.as_slice() {
            [_, "topology"] => Ok(Command::ShowTopology),
            [_, "names"] => Ok(Command::ShowNames),
            [_, "interest", "table"] => Ok(Command::ShowInterestTable),
            _ => Err("usage: show <topology|names|interest table> (st|sn|si)".into()),
        },
        "st" => Ok(Command::ShowTopology),
        "sn" => Ok(Command::ShowNames),
        "si" => Ok(Command::ShowInterestTable),
        "leave" | "l" => Ok(Command::Leave),
        "exit" | "x" => Ok(Command::Exit),
        other => Err(format!(
            "unknown command '{other}'; type 'help' for the command list"
        )),
    }
}

fn parse_target(ip: &str, port: &str) -> Result<Command, String> {
    NodeAddr::from_tokens(ip, port)
        .map(Command::DirectJoin)
        .map_err(|err| format!("{err}\nusage: direct join (dj) <ip> <port>"))
}

fn named(
    tokens: &[&str],
    usage: &str,
    build: fn(ObjectName) -> Command,
) -> Result<Command, String> {
    match tokens {
        [_, name] => ObjectName::new(name)
            .map(build)
            .map_err(|err| format!("{err}\nusage: {usage}")),
        _ => Err(format!("usage: {usage}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbs_and_aliases() {
        assert_eq!(parse("help").unwrap(), Command::Help);
        assert_eq!(parse("leave").unwrap(), parse("l").unwrap());
        assert_eq!(parse("exit").unwrap(), parse("x").unwrap());
        assert_eq!(parse("show topology").unwrap(), parse("st").unwrap());
        assert_eq!(parse("show names").unwrap(), parse("sn").unwrap());
        assert_eq!(parse("show interest table").unwrap(), parse("si").unwrap());
        assert_eq!(parse("create movie.mp4").unwrap(), parse("c movie.mp4").unwrap());
    }

    #[test]
    fn join_bounds() {
        assert_eq!(
            parse("join 042").unwrap(),
            Command::Join("42".parse().unwrap())
        );
        assert!(parse("join -1").is_err());
        assert!(parse("join 1000").is_err());
        assert!(parse("join").is_err());
    }

    #[test]
    fn direct_join_forms() {
        let target = parse("direct join 1.0.0.1 5001").unwrap();
        assert_eq!(target, parse("dj 1.0.0.1 5001").unwrap());
        assert_eq!(
            target,
            Command::DirectJoin(NodeAddr::new([1, 0, 0, 1].into(), 5001))
        );
        assert!(parse("direct 1.0.0.1 5001").is_err());
        assert!(parse("dj 1.0.0.1").is_err());
    }

    #[test]
    fn name_validation_is_surfaced() {
        assert!(parse(&format!("create {}", "x".repeat(100))).is_ok());
        assert!(parse(&format!("create {}", "x".repeat(101))).is_err());
        assert!(parse("retrieve").is_err());
    }

    #[test]
    fn noise_is_rejected_gently() {
        assert!(parse("").is_err());
        assert!(parse("   ").is_err());
        assert!(parse("frobnicate").is_err());
        assert!(parse("show everything").is_err());
    }
}
