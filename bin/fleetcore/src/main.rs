use fleetcore::run;

fn main() {
    let result = run();

    if let Err(error) = result {
        eprintln!("fleetcore process failed: {:?}", error);
        std::process::exit(1);
    }
}
