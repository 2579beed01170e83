fn main() {
    if let Err(e) = dmreg::run() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
