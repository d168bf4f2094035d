use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use clap::Parser;
use quip::{Machine, RuntimeError};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Interactive interpreter for the quip statement language.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Prompt printed before each line is read.
    #[arg(long, default_value = "# ")]
    prompt: String,

    /// Skip the welcome banner.
    #[arg(short, long)]
    quiet: bool,

    /// Run these lines in one session instead of reading stdin.
    #[arg(short = 'c', long = "command", value_name = "LINE")]
    commands: Vec<String>,

    /// Print every variable when the session ends.
    #[arg(long)]
    dump_vars: bool,

    /// Log more (-v info, -vv debug, -vvv trace). RUST_LOG wins if set.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(io::stderr)
                .with_target(true)
                .with_level(true),
        )
        .with(filter)
        .init();
}

fn report(out: &mut impl Write, error: &anyhow::Error) -> io::Result<()> {
    // runtime errors can follow partial output on the same line
    if error.is::<RuntimeError>() {
        writeln!(out)?;
    }
    writeln!(out, "Error: {error}")
}

fn welcome(out: &mut impl Write, quiet: bool) -> io::Result<()> {
    if quiet {
        return Ok(());
    }
    writeln!(out, "Welcome to quip.")
}

/// Returns `false` if any line failed; later lines still run.
fn run_commands<M: Write>(
    machine: &mut Machine<M>,
    commands: &[String],
    out: &mut impl Write,
) -> io::Result<bool> {
    let mut ok = true;
    for line in commands {
        match machine.eval_line(line) {
            Ok(()) => writeln!(out)?,
            Err(error) => {
                report(out, &error)?;
                ok = false;
            }
        }
    }
    Ok(ok)
}

fn repl<M: Write>(
    machine: &mut Machine<M>,
    mut input: impl BufRead,
    out: &mut impl Write,
    prompt: &str,
) -> io::Result<()> {
    let mut buf = Vec::new();
    loop {
        write!(out, "{prompt}")?;
        out.flush()?;
        buf.clear();
        if input.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        // invalid UTF-8 becomes U+FFFD, which the scanner then rejects
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(&['\n', '\r'][..]);
        match machine.eval_line(line) {
            Err(error) => report(out, &error)?,
            Ok(()) => {
                writeln!(out)?;
                writeln!(out, "ok")?;
            }
        }
    }
    writeln!(out)
}

fn dump_vars<M: Write>(machine: &Machine<M>, out: &mut impl Write) -> io::Result<()> {
    let mut variables: Vec<_> = machine.variables().collect();
    variables.sort_unstable();
    for (name, value) in variables {
        writeln!(out, "{name} = \"{value}\"")?;
    }
    Ok(())
}

fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut out = io::stdout();
    let mut machine = Machine::new();
    let ok = if args.commands.is_empty() {
        welcome(&mut out, args.quiet)?;
        info!("session started");
        repl(&mut machine, io::stdin().lock(), &mut out, &args.prompt)?;
        true
    } else {
        info!(lines = args.commands.len(), "running commands");
        run_commands(&mut machine, &args.commands, &mut out)?
    };

    if args.dump_vars {
        dump_vars(&machine, &mut out)?;
    }
    Ok(if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn machine() -> Machine<Vec<u8>> {
        Machine::with_output(Vec::new())
    }

    fn text(bytes: &[u8]) -> String {
        String::from_utf8_lossy(bytes).into_owned()
    }

    #[test]
    fn args_parse_all_flags() {
        let args = Args::try_parse_from([
            "quip", "-q", "-c", "print \"a\";", "-c", "calc 1;", "--dump-vars", "-vv",
            "--prompt", "> ",
        ])
        .unwrap();
        assert!(args.quiet);
        assert!(args.dump_vars);
        assert_eq!(args.verbose, 2);
        assert_eq!(args.prompt, "> ");
        assert_eq!(args.commands, ["print \"a\";", "calc 1;"]);
    }

    #[test]
    fn args_default_prompt() {
        let args = Args::try_parse_from(["quip"]).unwrap();
        assert_eq!(args.prompt, "# ");
        assert!(!args.quiet);
        assert!(args.commands.is_empty());
    }

    #[test]
    fn banner_respects_quiet() {
        let mut out = Vec::new();
        welcome(&mut out, false).unwrap();
        assert_eq!(text(&out), "Welcome to quip.\n");

        let mut out = Vec::new();
        welcome(&mut out, true).unwrap();
        assert_eq!(text(&out), "");
    }

    #[test]
    fn repl_prints_ok_after_each_successful_line() {
        let mut m = machine();
        let mut out = Vec::new();
        let input = b"set #x = \"1\";\nprint #x;\n";
        repl(&mut m, &input[..], &mut out, "# ").unwrap();
        assert_eq!(text(&out), "# \nok\n# \nok\n# \n");
        assert_eq!(text(m.output()), "1");
    }

    #[test]
    fn repl_reports_errors_and_keeps_going() {
        let mut m = machine();
        let mut out = Vec::new();
        let input = b"print 1;\ncalc 1/0;\nprint \"b\";\n";
        repl(&mut m, &input[..], &mut out, "> ").unwrap();
        assert_eq!(
            text(&out),
            "> Error: expected string or identifier, got 1\n\
             > \nError: cannot divide by zero\n\
             > \nok\n\
             > \n"
        );
        assert_eq!(text(m.output()), "b");
    }

    #[test]
    fn repl_survives_invalid_utf8() {
        let mut m = machine();
        let mut out = Vec::new();
        let input = b"print \xff;\r\nprint \"b\";";
        repl(&mut m, &input[..], &mut out, "").unwrap();
        let shown = text(&out);
        assert!(shown.starts_with("Error: unexpected character at [1:7]\n"), "{shown}");
        assert!(shown.ends_with("\nok\n\n"), "{shown}");
        assert_eq!(text(m.output()), "b");
    }

    #[test]
    fn run_commands_fails_if_any_line_fails() {
        let mut m = machine();
        let mut out = Vec::new();
        let commands = [
            "set #a = \"1\";".to_string(),
            "calc 1/0;".to_string(),
            "set #b = \"2\";".to_string(),
        ];
        let ok = run_commands(&mut m, &commands, &mut out).unwrap();
        assert!(!ok);
        assert_eq!(m.variable("b"), Some("2"));
        assert_eq!(text(&out), "\n\nError: cannot divide by zero\n\n");
    }

    #[test]
    fn run_commands_succeeds_when_every_line_does() {
        let mut m = machine();
        let mut out = Vec::new();
        let commands = ["calc 2+3*4;".to_string()];
        assert!(run_commands(&mut m, &commands, &mut out).unwrap());
        assert_eq!(text(m.output()), "14");
    }

    #[test]
    fn dump_vars_sorts_by_name() {
        let mut m = machine();
        m.eval_line("set #zeta = \"z\"; set #alpha = \"a\"; set #mid = \"m\";")
            .unwrap();
        let mut out = Vec::new();
        dump_vars(&m, &mut out).unwrap();
        assert_eq!(
            text(&out),
            "alpha = \"a\"\nmid = \"m\"\nzeta = \"z\"\n"
        );
    }
}
