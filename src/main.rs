fn main() {
    if let Err(err) = movie_normalize::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
