use mailsearch::CliError;

fn is_json_mode_args() -> bool {
    std::env::args().any(|arg| arg == "--json")
}

fn report(err: &CliError) {
    if is_json_mode_args() {
        let payload = serde_json::json!({
            "error": {
                "code": err.code,
                "kind": err.kind,
                "message": err.message,
                "hint": err.hint,
                "retryable": err.retryable,
            }
        });
        eprintln!("{payload}");
    } else {
        eprintln!("{err}");
    }
}

fn main() {
    let raw_args: Vec<String> = std::env::args().collect();
    let parsed = match mailsearch::parse_cli(raw_args) {
        Ok(parsed) => parsed,
        Err(err) if err.code == 0 => {
            // --help / --version
            print!("{}", err.message);
            std::process::exit(0);
        }
        Err(err) => {
            report(&err);
            std::process::exit(err.code);
        }
    };

    if let Err(err) = mailsearch::run_with_parsed(parsed) {
        report(&err);
        std::process::exit(err.code);
    }
}
