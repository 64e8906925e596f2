//! Parse a small program and print its spindle speed table.
//!
//! Run with `cargo run --example speeds_demo -- [material] [tool-diameter]`.

use anyhow::{Context, Result};
use grace::parser;
use grace::speeds::{MaterialRegistry, SpeedVisitor};

const PROGRAM: &str = "%(bracket)
N10 G71 G97
N20 S3500 M3
N30 G0 X0 Y0 Z5
N40 G1 Z-1 F120
N50 G96 S16
N60 G97 S9000
N70 M30
";

fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let material = args.next().unwrap_or_else(|| "steel-tough".to_string());
    let diameter: f32 = match args.next() {
        Some(d) => d.parse().context("tool diameter must be a number")?,
        None => 1.5,
    };

    let registry = MaterialRegistry::with_builtin()?;
    let data = registry
        .get(&material)
        .with_context(|| format!("unknown material '{}'", material))?
        .cutting_data(diameter);

    let program = parser::parse(PROGRAM)?;
    println!("{}", program.header);
    for record in SpeedVisitor::new(data).records(&program) {
        println!(
            "line {:>2}: S{:<6} recommended {:>11}  {}",
            record.line,
            record.requested_value,
            record.range_label(),
            record.status()
        );
    }
    Ok(())
}
