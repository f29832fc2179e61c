fn main() {
    if let Err(err) = csv_merge::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
