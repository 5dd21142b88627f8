// Solves the reference problem (96 points, 100 steps, dt = 0.4 dx^2) on the
// serial solver and on 1..8 in-process workers, and reports how far each
// distributed answer is from the serial one.
//
//     cargo run --example local_heat [-- n nt]
use heat_halo::prelude::*;

fn main() -> Result<(), HeatError> {
    let mut args = std::env::args().skip(1).map(|a| a.parse::<usize>());
    let n = match args.next() {
        Some(Ok(n)) => n,
        Some(Err(e)) => return Err(HeatError::InvalidParams(format!("bad n: {e}"))),
        None => 96,
    };
    let nt = match args.next() {
        Some(Ok(nt)) => nt,
        Some(Err(e)) => return Err(HeatError::InvalidParams(format!("bad nt: {e}"))),
        None => 100,
    };

    let params = ProblemParams::reference(n, nt);
    let config = SolverConfig::default();
    for workers in [1, 2, 3, 4, 6, 8] {
        if n % workers != 0 {
            println!("P={workers}: skipped, {n} points do not split evenly");
            continue;
        }
        // ones over the first chunk, zeros elsewhere
        let u0 = step_function(n, n / workers);
        let serial = solve_serial(&u0, &params, &config)?;
        let parallel = run_local(workers, &u0, &params, &config)?;
        let err = l2_distance(&parallel, &serial)?;
        println!(
            "P={workers}: max {:.6}, |parallel - serial| = {err:e}",
            max_value(&parallel)
        );
    }
    Ok(())
}
