fn main() {
    if let Err(err) = dagsvg::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
