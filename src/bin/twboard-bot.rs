use std::ffi::OsString;

fn main() {
    let mut args: Vec<OsString> = std::env::args_os().collect();
    if args.is_empty() {
        args.push(OsString::from("twboard-bot"));
    }
    args.insert(1, OsString::from("bot"));
    if let Err(err) = twboard::cli::run(args) {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}
