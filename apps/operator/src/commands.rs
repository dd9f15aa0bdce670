use anyhow::{anyhow, bail, Context};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Submit {
        age: u32,
        gender: String,
        symptoms: String,
    },
    Check,
    Wait,
    Select {
        disease: String,
    },
    Feedback {
        accepted: bool,
    },
    Status,
    Stats,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  submit <age> <gender> <symptoms...>   send a new case
  check                                 ask once for the diagnosis
  wait                                  poll until diagnosed (bounded)
  select <disease>                      choose a candidate diagnosis
  accept | reject                       send feedback on the selection
  status                                show the current phase
  stats                                 show feedback statistics
  help | quit";

impl ConsoleCommand {
    /// `Ok(None)` for blank lines.
    pub fn parse(line: &str) -> anyhow::Result<Option<Self>> {
        let line = line.trim();
        let Some((verb, rest)) = split_word(line) else {
            return Ok(None);
        };
        let command = match verb.to_ascii_lowercase().as_str() {
            "submit" => {
                let (age, rest) = split_word(rest)
                    .ok_or_else(|| anyhow!("usage: submit <age> <gender> <symptoms...>"))?;
                let age = age
                    .parse::<u32>()
                    .with_context(|| format!("age must be a non-negative integer, got '{age}'"))?;
                let (gender, symptoms) = split_word(rest).unwrap_or(("", ""));
                Self::Submit {
                    age,
                    gender: gender.to_string(),
                    symptoms: symptoms.to_string(),
                }
            }
            "check" => Self::Check,
            "wait" => Self::Wait,
            "select" => {
                if rest.is_empty() {
                    bail!("usage: select <disease>");
                }
                Self::Select {
                    disease: rest.to_string(),
                }
            }
            "accept" => Self::Feedback { accepted: true },
            "reject" => Self::Feedback { accepted: false },
            "status" => Self::Status,
            "stats" => Self::Stats,
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => bail!("unknown command '{other}'; type 'help'"),
        };
        Ok(Some(command))
    }
}

fn split_word(input: &str) -> Option<(&str, &str)> {
    let input = input.trim_start();
    if input.is_empty() {
        return None;
    }
    match input.split_once(char::is_whitespace) {
        Some((word, rest)) => Some((word, rest.trim())),
        None => Some((input, "")),
    }
}
