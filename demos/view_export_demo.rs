use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    opsview::example_apps::run_view_export_demo(std::env::args().skip(1))
}
