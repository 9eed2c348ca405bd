fn main() {
    if let Err(err) = bonita_importfile::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
