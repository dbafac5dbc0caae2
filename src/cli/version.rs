/// Display version information
pub fn execute() {
    println!("quorum {}", env!("CARGO_PKG_VERSION"));
    println!("Operator CLI for the Quorum multi-owner custody ledger");
}
