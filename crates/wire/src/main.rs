use std::env;
use std::io;
use std::process::ExitCode;

use assault_wire::{run, CommandKind, CommonOptions};

fn main() -> ExitCode {
    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{message}");
            ExitCode::from(1)
        }
    }
}

fn run_cli() -> Result<(), String> {
    let args = env::args().skip(1).collect::<Vec<_>>();
    if args.is_empty() {
        return Err(usage_text());
    }
    if args[0] == "-h" || args[0] == "--help" {
        print_usage();
        return Ok(());
    }

    let mut options = CommonOptions::default();
    let mut index = 0usize;
    while index < args.len() {
        match args[index].as_str() {
            "--addr" => {
                let value = args
                    .get(index + 1)
                    .ok_or_else(|| "missing value for --addr".to_string())?;
                options.addr = value.clone();
                index += 2;
            }
            "--timeout-ms" => {
                let value = args
                    .get(index + 1)
                    .ok_or_else(|| "missing value for --timeout-ms".to_string())?;
                options.timeout_ms = value
                    .parse::<u64>()
                    .map_err(|_| format!("invalid --timeout-ms value '{value}' (expected u64)"))?;
                index += 2;
            }
            "--retry-ms" => {
                let value = args
                    .get(index + 1)
                    .ok_or_else(|| "missing value for --retry-ms".to_string())?;
                options.retry_ms = value
                    .parse::<u64>()
                    .map_err(|_| format!("invalid --retry-ms value '{value}' (expected u64)"))?;
                index += 2;
            }
            _ => break,
        }
    }

    let command = args
        .get(index)
        .ok_or_else(|| "missing subcommand".to_string())?
        .as_str();
    let command_args = &args[(index + 1)..];

    let kind = match command {
        "wait-snapshot" => {
            if !command_args.is_empty() {
                return Err("wait-snapshot takes no arguments".to_string());
            }
            CommandKind::WaitSnapshot
        }
        "send" => match command_args {
            [room, action] => CommandKind::Send {
                room: room.clone(),
                action: action.clone(),
                args: "[]".to_string(),
            },
            [room, action, rest @ ..] => CommandKind::Send {
                room: room.clone(),
                action: action.clone(),
                args: rest.join(" "),
            },
            _ => return Err("send requires <room> <action> [json-args]".to_string()),
        },
        "script" => match command_args {
            [room, path] => CommandKind::Script {
                room: room.clone(),
                path: path.clone(),
            },
            _ => return Err("script requires <room> <file>".to_string()),
        },
        other => return Err(format!("unknown subcommand '{other}'")),
    };

    run(kind, options, &mut io::stdout()).map_err(|err| err.to_string())
}

fn print_usage() {
    println!("{}", usage_text());
}

fn usage_text() -> String {
    [
        "assault_wire - line client for the game server",
        "",
        "Usage:",
        "  assault_wire [--addr <host:port>] [--timeout-ms <u64>] [--retry-ms <u64>] wait-snapshot",
        "  assault_wire [--addr <host:port>] [--timeout-ms <u64>] [--retry-ms <u64>] send <room> <action> [json-args]",
        "  assault_wire [--addr <host:port>] [--timeout-ms <u64>] [--retry-ms <u64>] script <room> <file>",
        "",
        "Script files hold one '<action> [json-args]' per line; '#' starts a comment.",
        "",
        "Defaults:",
        "  --addr 127.0.0.1:5000",
        "  --timeout-ms 5000",
        "  --retry-ms 100",
    ]
    .join("\n")
}
