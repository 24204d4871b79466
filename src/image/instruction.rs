//! Build instructions
//!
//! Each [`BuildInstruction`] renders to one build-script instruction through
//! its `Display` impl. Exec-form arguments are written as JSON arrays.

use crate::command::Command;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Continuation between the lines of a multi-line `RUN`
const RUN_CONTINUATION: &str = " \\\n    ";

/// Port protocol
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Udp => write!(f, "udp"),
        }
    }
}

/// One build-script instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildInstruction {
    /// `# text`
    Comment(String),
    /// FROM instruction - base image
    From { image: String, alias: Option<String> },
    /// ARG instruction - build argument
    Arg {
        name: String,
        default: Option<String>,
    },
    /// ENV instruction - set environment variable
    Env { key: String, value: String },
    /// EXPOSE instruction - expose port
    Expose { port: u16, protocol: Protocol },
    /// VOLUME instruction - create volume mount point
    Volume { paths: Vec<String> },
    /// WORKDIR instruction - set working directory
    Workdir { path: String },
    /// COPY instruction - copy files
    Copy {
        src: Vec<String>,
        dest: String,
        from: Option<String>,
        chown: Option<String>,
    },
    /// RUN instruction; several lines are joined with continuations
    Run { lines: Vec<String> },
    /// USER instruction - set user
    User { user: String, group: Option<String> },
    /// ENTRYPOINT instruction
    Entrypoint(Command),
    /// CMD instruction - default command
    Cmd(Command),
}

impl BuildInstruction {
    /// Single-line `RUN`
    pub fn run(command: impl Into<String>) -> Self {
        BuildInstruction::Run {
            lines: vec![command.into()],
        }
    }
}

impl fmt::Display for BuildInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildInstruction::Comment(text) => write!(f, "# {}", text),
            BuildInstruction::From { image, alias } => match alias {
                Some(alias) => write!(f, "FROM {} AS {}", image, alias),
                None => write!(f, "FROM {}", image),
            },
            BuildInstruction::Arg { name, default } => match default {
                Some(default) => write!(f, "ARG {}={}", name, env_value(default)),
                None => write!(f, "ARG {}", name),
            },
            BuildInstruction::Env { key, value } => write!(f, "ENV {}={}", key, env_value(value)),
            BuildInstruction::Expose { port, protocol } => match protocol {
                Protocol::Tcp => write!(f, "EXPOSE {}", port),
                Protocol::Udp => write!(f, "EXPOSE {}/udp", port),
            },
            BuildInstruction::Volume { paths } => write!(f, "VOLUME {}", json_array(paths)?),
            BuildInstruction::Workdir { path } => write!(f, "WORKDIR {}", path),
            BuildInstruction::Copy {
                src,
                dest,
                from,
                chown,
            } => {
                write!(f, "COPY")?;
                if let Some(from) = from {
                    write!(f, " --from={}", from)?;
                }
                if let Some(chown) = chown {
                    write!(f, " --chown={}", chown)?;
                }
                for src in src {
                    write!(f, " {}", src)?;
                }
                write!(f, " {}", dest)
            }
            BuildInstruction::Run { lines } => write!(f, "RUN {}", lines.join(RUN_CONTINUATION)),
            BuildInstruction::User { user, group } => match group {
                Some(group) => write!(f, "USER {}:{}", user, group),
                None => write!(f, "USER {}", user),
            },
            BuildInstruction::Entrypoint(command) => write_command(f, "ENTRYPOINT", command),
            BuildInstruction::Cmd(command) => write_command(f, "CMD", command),
        }
    }
}

fn write_command(f: &mut fmt::Formatter<'_>, keyword: &str, command: &Command) -> fmt::Result {
    match command {
        Command::Shell(cmd) => write!(f, "{} {}", keyword, cmd),
        Command::Exec(args) => write!(f, "{} {}", keyword, json_array(args)?),
    }
}

fn json_array(items: &[String]) -> Result<String, fmt::Error> {
    serde_json::to_string(items).map_err(|_| fmt::Error)
}

/// Quote values the build-script parser would split or unescape
fn env_value(value: &str) -> String {
    let needs_quotes = value.is_empty()
        || value
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '"' | '\'' | '\\' | '$' | '#'));
    if !needs_quotes {
        return value.to_string();
    }
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        if matches!(ch, '"' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_instructions() {
        let from = BuildInstruction::From {
            image: "rust:1.80".to_string(),
            alias: Some("builder".to_string()),
        };
        assert_eq!(from.to_string(), "FROM rust:1.80 AS builder");

        let env = BuildInstruction::Env {
            key: "PORT".to_string(),
            value: "3000".to_string(),
        };
        assert_eq!(env.to_string(), "ENV PORT=3000");

        let expose = BuildInstruction::Expose {
            port: 53,
            protocol: Protocol::Udp,
        };
        assert_eq!(expose.to_string(), "EXPOSE 53/udp");
    }

    #[test]
    fn test_env_quoting() {
        let env = BuildInstruction::Env {
            key: "GREETING".to_string(),
            value: "hello \"world\"".to_string(),
        };
        assert_eq!(env.to_string(), r#"ENV GREETING="hello \"world\"""#);
        let empty = BuildInstruction::Arg {
            name: "TOKEN".to_string(),
            default: Some(String::new()),
        };
        assert_eq!(empty.to_string(), "ARG TOKEN=\"\"");
    }

    #[test]
    fn test_exec_form_is_json() {
        let cmd = BuildInstruction::Cmd(Command::exec(["node", "server.js"]));
        assert_eq!(cmd.to_string(), r#"CMD ["node","server.js"]"#);
        let shell = BuildInstruction::Entrypoint(Command::from("./entrypoint.sh"));
        assert_eq!(shell.to_string(), "ENTRYPOINT ./entrypoint.sh");
        let volume = BuildInstruction::Volume {
            paths: vec!["/data".to_string()],
        };
        assert_eq!(volume.to_string(), r#"VOLUME ["/data"]"#);
    }

    #[test]
    fn test_copy_and_run() {
        let copy = BuildInstruction::Copy {
            src: vec!["package.json".to_string(), "yarn.lock".to_string()],
            dest: "./".to_string(),
            from: Some("deps".to_string()),
            chown: Some("node:node".to_string()),
        };
        assert_eq!(
            copy.to_string(),
            "COPY --from=deps --chown=node:node package.json yarn.lock ./"
        );

        let run = BuildInstruction::Run {
            lines: vec!["apt-get update &&".to_string(), "apt-get install -y curl".to_string()],
        };
        assert_eq!(
            run.to_string(),
            "RUN apt-get update && \\\n    apt-get install -y curl"
        );
    }
}
