//! Line commands read from stdin by `livesync run`.

use livesync_protocol::UserAction;

pub const HELP: &str = "\
  inc | dec | reset          counter
  input <text>               set the todo input
  add [text]                 add the input (or <text>) as a todo
  done <n> | undo <n>        complete / reopen todo n
  rm <n> | rmdone <n>        remove todo / completed item n
  connect | disconnect       stream control
  clear                      clear received records
  show | help | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Actions(Vec<UserAction>),
    Show,
    Help,
    Quit,
}

/// Parse one input line. Item numbers are 1-based as displayed.
pub fn parse(line: &str) -> Result<ReplCommand, String> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let single = |action: UserAction| -> Result<ReplCommand, String> {
        Ok(ReplCommand::Actions(vec![action]))
    };

    match word {
        "" | "show" => Ok(ReplCommand::Show),
        "help" | "?" => Ok(ReplCommand::Help),
        "quit" | "exit" | "q" => Ok(ReplCommand::Quit),
        "inc" | "+" => single(UserAction::Increment),
        "dec" | "-" => single(UserAction::Decrement),
        "reset" => single(UserAction::ResetCount),
        "input" => single(UserAction::SetInput {
            text: rest.to_string(),
        }),
        "add" if rest.is_empty() => single(UserAction::AddTodo),
        "add" => Ok(ReplCommand::Actions(vec![
            UserAction::SetInput {
                text: rest.to_string(),
            },
            UserAction::AddTodo,
        ])),
        "done" => single(UserAction::CompleteTodo {
            index: item_index(rest)?,
        }),
        "undo" => single(UserAction::UncompleteTodo {
            index: item_index(rest)?,
        }),
        "rm" => single(UserAction::RemoveTodo {
            index: item_index(rest)?,
        }),
        "rmdone" => single(UserAction::RemoveCompleted {
            index: item_index(rest)?,
        }),
        "connect" => single(UserAction::Connect),
        "disconnect" => single(UserAction::Disconnect),
        "clear" => single(UserAction::ClearRecords),
        other => Err(format!("Unknown command: {other} (try `help`)")),
    }
}

fn item_index(arg: &str) -> Result<usize, String> {
    match arg.parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n - 1),
        _ => Err(format!("Expected an item number, got `{arg}`")),
    }
}
