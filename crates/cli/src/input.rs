//! Line commands accepted by `porelog record`.

use crate::error::{Error, Result};

pub const HELP: &str = "\
Commands:
  event <type> <url|-> [value...]   store an event (\"-\" for no url)
  metric <type> <number>            buffer a metric sample
  flush                             write buffered metrics now
  dump                              export everything to a file
  status                            show counters
  help                              show this list
  quit                              leave";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Event {
        kind: String,
        url: Option<String>,
        value: String,
    },
    Metric {
        kind: String,
        value: f64,
    },
    Flush,
    Dump,
    Status,
    Help,
    Quit,
}

/// Parse one input line. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Result<Option<Command>> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };

    let command = match verb {
        "event" => {
            let kind = words.next().ok_or_else(|| usage("event <type> <url|-> [value...]"))?;
            let url = words.next().ok_or_else(|| usage("event <type> <url|-> [value...]"))?;
            Command::Event {
                kind: kind.to_string(),
                url: (url != "-").then(|| url.to_string()),
                value: words.collect::<Vec<_>>().join(" "),
            }
        }
        "metric" => {
            let kind = words.next().ok_or_else(|| usage("metric <type> <number>"))?;
            let raw = words.next().ok_or_else(|| usage("metric <type> <number>"))?;
            let value = raw
                .parse::<f64>()
                .map_err(|_| Error::InvalidCommand(format!("'{raw}' is not a number")))?;
            if words.next().is_some() {
                return Err(usage("metric <type> <number>"));
            }
            Command::Metric {
                kind: kind.to_string(),
                value,
            }
        }
        "flush" => Command::Flush,
        "dump" => Command::Dump,
        "status" => Command::Status,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(Error::InvalidCommand(format!("unknown command '{other}'"))),
    };
    Ok(Some(command))
}

fn usage(form: &str) -> Error {
    Error::InvalidCommand(format!("usage: {form}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_line_is_ignored() {
        assert_eq!(parse_line("").unwrap(), None);
        assert_eq!(parse_line("   \t").unwrap(), None);
    }

    #[test]
    fn event_with_url_and_multiword_value() {
        let cmd = parse_line("event click /setVoltage?value=0.5 voltage set ok")
            .unwrap()
            .unwrap();
        assert_eq!(
            cmd,
            Command::Event {
                kind: "click".into(),
                url: Some("/setVoltage?value=0.5".into()),
                value: "voltage set ok".into(),
            }
        );
    }

    #[test]
    fn event_dash_means_no_url() {
        let cmd = parse_line("event note -").unwrap().unwrap();
        assert_eq!(
            cmd,
            Command::Event {
                kind: "note".into(),
                url: None,
                value: String::new(),
            }
        );
    }

    #[test]
    fn metric_parses_number() {
        let cmd = parse_line("metric current -1.5e-3").unwrap().unwrap();
        assert_eq!(
            cmd,
            Command::Metric {
                kind: "current".into(),
                value: -1.5e-3,
            }
        );
    }

    #[test]
    fn bad_input_is_rejected() {
        assert!(parse_line("event").is_err());
        assert!(parse_line("metric v").is_err());
        assert!(parse_line("metric v abc").is_err());
        assert!(parse_line("metric v 1 2").is_err());
        assert!(matches!(
            parse_line("launch"),
            Err(Error::InvalidCommand(msg)) if msg.contains("launch")
        ));
    }

    #[test]
    fn simple_verbs() {
        assert_eq!(parse_line("flush").unwrap(), Some(Command::Flush));
        assert_eq!(parse_line(" dump ").unwrap(), Some(Command::Dump));
        assert_eq!(parse_line("status").unwrap(), Some(Command::Status));
        assert_eq!(parse_line("?").unwrap(), Some(Command::Help));
        assert_eq!(parse_line("exit").unwrap(), Some(Command::Quit));
    }
}
