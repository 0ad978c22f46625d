//! Command-line argument parsing.

use std::path::PathBuf;

pub const USAGE: &str = "\
Grounded proposal generator

Usage: proposal <command> [options]

Commands:
  generate [--brief <text>] [--brief-file <path>] <file>...
                           Generate a proposal from uploaded files and a brief
  index                    Rebuild the training corpus index
  help                     Show this help message

Environment:
  PROPOSAL_DATA_DIR        Data directory (default: ./data)
  OPENAI_API_KEY, ANTHROPIC_API_KEY, GROQ_API_KEY
                           Language model credentials";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Generate { files: Vec<PathBuf>, brief: Brief },
    Index,
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Brief {
    Text(String),
    File(PathBuf),
}

impl Brief {
    pub fn resolve(&self) -> std::io::Result<String> {
        match self {
            Self::Text(text) => Ok(text.clone()),
            Self::File(path) => std::fs::read_to_string(path),
        }
    }
}

/// Parse arguments after the program name.
pub fn parse(args: &[String]) -> Result<Command, String> {
    let Some(command) = args.first() else {
        return Ok(Command::Help);
    };

    match command.as_str() {
        "generate" => parse_generate(&args[1..]),
        "index" => match args.get(1) {
            None => Ok(Command::Index),
            Some(extra) => Err(format!("Unexpected argument to index: {}", extra)),
        },
        "--help" | "-h" | "help" => Ok(Command::Help),
        other => Err(format!(
            "Unknown command: {}. Use 'proposal help' for usage.",
            other
        )),
    }
}

fn parse_generate(args: &[String]) -> Result<Command, String> {
    let mut files = Vec::new();
    let mut brief = None;
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--brief" | "-b" => {
                let text = iter.next().ok_or("--brief requires a value")?;
                brief = Some(Brief::Text(text.clone()));
            }
            "--brief-file" => {
                let path = iter.next().ok_or("--brief-file requires a path")?;
                brief = Some(Brief::File(PathBuf::from(path)));
            }
            flag if flag.starts_with("--") => return Err(format!("Unknown option: {}", flag)),
            file => files.push(PathBuf::from(file)),
        }
    }

    if files.is_empty() && brief.is_none() {
        return Err("generate needs at least one file or a --brief".into());
    }

    Ok(Command::Generate {
        files,
        brief: brief.unwrap_or(Brief::Text(String::new())),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_generate_with_files_and_brief() {
        let cmd = parse(&args(&["generate", "rfp.pdf", "--brief", "Build it", "notes.docx"])).unwrap();
        assert_eq!(
            cmd,
            Command::Generate {
                files: vec![PathBuf::from("rfp.pdf"), PathBuf::from("notes.docx")],
                brief: Brief::Text("Build it".into()),
            }
        );
    }

    #[test]
    fn test_generate_requires_input() {
        assert!(parse(&args(&["generate"])).is_err());
        assert!(parse(&args(&["generate", "--brief"])).is_err());
        assert!(parse(&args(&["generate", "--verbose", "a.txt"])).is_err());
    }

    #[test]
    fn test_other_commands() {
        assert_eq!(parse(&[]).unwrap(), Command::Help);
        assert_eq!(parse(&args(&["help"])).unwrap(), Command::Help);
        assert_eq!(parse(&args(&["index"])).unwrap(), Command::Index);
        assert!(parse(&args(&["index", "extra"])).is_err());
        assert!(parse(&args(&["serve"])).is_err());
    }

    #[test]
    fn test_brief_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("brief.txt");
        std::fs::write(&path, "From a file").unwrap();

        let cmd = parse(&args(&["generate", "--brief-file", path.to_str().unwrap()])).unwrap();
        let Command::Generate { brief, files } = cmd else {
            panic!("expected generate");
        };
        assert!(files.is_empty());
        assert_eq!(brief.resolve().unwrap(), "From a file");
    }
}
