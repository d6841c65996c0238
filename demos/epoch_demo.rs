use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    rank_triplets::example_apps::run_epoch_demo(std::env::args().skip(1))
}
