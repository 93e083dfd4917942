//! Micropush command line interface.

use std::process;

use clap::{
    crate_description, crate_name, crate_version, App, AppSettings::*, Arg, ArgMatches, SubCommand,
};
use console::style;
use log::{debug, trace, LevelFilter};
use simplelog::*;

use micropush as mp;

fn main() {
    println!("[MP] micropush v{}", crate_version!());

    ctrlc::set_handler(move || {
        println!("🛑 received Ctrl+C!");
        process::exit(0);
    })
    .expect("Failed to install my Ctrl-C handler!");

    let matches = App::new(crate_name!())
        .version(format!("v{}", crate_version!()).as_str())
        .about(crate_description!())
        .long_about(
            "\n\
            Micropush is the last mile of the compiler toolchain for \
            MicroPython boards. The `rewrite` command takes the raw output \
            of the code generator and replaces its desktop preamble with \
            the board preamble, dropping the host-only imports. The `push` \
            command interrupts whatever program the board is running, \
            soft-reboots its interpreter over the serial line, uploads the \
            runtime support library and the rewritten program through the \
            `ampy` transfer tool, and resets the board so the new program \
            starts.\n\
            \n\
            The two commands are independent: `rewrite` needs no board and \
            `push` can run later, on another machine.\
        ",
        )
        .max_term_width(80)
        .setting(ColoredHelp)
        .setting(NextLineHelp)
        .setting(SubcommandRequiredElseHelp)
        .arg(Arg::with_name("v").short("v").multiple(true).global(true).help(
            "Sets the logging level of verbosity, repeat several times for \
                higher verbosity",
        ))
        .subcommand(
            SubCommand::with_name("rewrite")
                .about("rewrite generator output for the MicroPython runtime")
                .arg(
                    Arg::with_name("INPUT")
                        .help("file holding the raw generator output")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::with_name("OUTPUT")
                        .help("path of the rewritten program")
                        .short("-o")
                        .long("--output")
                        .takes_value(true)
                        .default_value("main.py")
                        .require_equals(true),
                ),
        )
        .subcommand(
            SubCommand::with_name("push")
                .about("push the compiled program and its runtime to a board")
                .arg(
                    Arg::with_name("PORT")
                        .help("the serial device of the board")
                        .long_help(
                            "the serial device of the board (e.g. /dev/ttyUSB0 \
                             or COM3); may change when the board is unplugged \
                             and re-plugged and may differ between systems.",
                        )
                        .short("-p")
                        .long("--port")
                        .takes_value(true)
                        .required(true)
                        .require_equals(true),
                )
                .arg(
                    Arg::with_name("MAIN")
                        .help("local path of the compiled program to push")
                        .short("-m")
                        .long("--main")
                        .takes_value(true)
                        .default_value("main.py")
                        .require_equals(true),
                )
                .arg(
                    Arg::with_name("RUNTIME")
                        .help("local path of the runtime support file to push")
                        .short("-r")
                        .long("--runtime")
                        .takes_value(true)
                        .default_value("runtime/boardio.py")
                        .require_equals(true),
                ),
        )
        .get_matches();

    // Vary the output based on how many times the user used the "verbose"
    // flag (i.e. 'micropush -v -v -v' or 'micropush -vvv' vs 'micropush -v'
    let log_level = match matches.occurrences_of("v") {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    TermLogger::init(
        log_level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )
    .unwrap();

    trace!("{:#?}", matches);

    let exit_code = match matches.subcommand() {
        ("rewrite", Some(sub)) => run_rewrite(sub),
        ("push", Some(sub)) => run_push(sub),
        // SubcommandRequiredElseHelp makes anything else impossible.
        _ => unreachable!(),
    };

    debug!("exit code: {}", exit_code);
    process::exit(exit_code.into());
}

/// Read the generator output, prepend the MicroPython preamble, drop the
/// host-only imports and write the result newline-joined.
fn run_rewrite(matches: &ArgMatches) -> i8 {
    // Safe to unwrap: INPUT is required and OUTPUT has a default value.
    let input = matches.value_of("INPUT").unwrap();
    let output = matches.value_of("OUTPUT").unwrap();

    let raw = match std::fs::read_to_string(input) {
        Ok(raw) => raw,
        Err(e) => {
            println!(
                "{}: could not read `{}`: {}",
                style("error").red(),
                style(input).cyan(),
                e
            );
            return 1;
        }
    };
    let lines: Vec<String> = raw.lines().map(str::to_owned).collect();

    let code = mp::rewrite_to_string(&lines, &mp::PreambleSpec::default());
    if let Err(e) = std::fs::write(output, code) {
        println!(
            "{}: could not write `{}`: {}",
            style("error").red(),
            style(output).cyan(),
            e
        );
        return 1;
    }

    println!(
        "[MP] 📦 rewritten program written to {}",
        style(output).green()
    );
    println!("[MP] push it with `micropush push --port=<PORT>`");
    0
}

/// Run the deployment pipeline against the board on the requested port.
fn run_push(matches: &ArgMatches) -> i8 {
    // Safe to unwrap: PORT is required, the others have default values.
    let port = matches.value_of("PORT").unwrap();

    let settings = mp::SettingsBuilder::new()
        .path(port)
        .program_file(matches.value_of("MAIN").unwrap())
        .runtime_file(matches.value_of("RUNTIME").unwrap())
        .finalize();

    // The device node may not exist yet right after the board is plugged
    // in; wait for it, with `Esc` as the way out.
    if mp::wait_for_port(port) {
        println!(
            "[MP] ❌ cancelled while waiting for {}",
            style(port).cyan()
        );
        return 1;
    }

    let mut pipeline = mp::factory(settings);
    pipeline.run()
}
