// Distributed solve of the reference problem over MPI.
//
//     cargo mpirun -n 4 --features mpi-support --example mpi_heat
//
// Rank 0 builds the initial condition, scatters it, gathers the answer and
// compares it with the serial solver.
fn main() {
    use heat_halo::prelude::*;

    let comm = match MpiComm::new() {
        Ok(comm) => comm,
        Err(e) => {
            eprintln!("mpi_heat: {e}");
            std::process::exit(1);
        }
    };
    let ctx = match WorkerContext::new(comm) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("mpi_heat: {e}");
            std::process::exit(1);
        }
    };

    let n = 96;
    let params = ProblemParams::reference(n, 100);
    let config = SolverConfig::default();
    let u0 = step_function(n, n / ctx.size());
    let input = ctx.is_root().then_some(u0.as_slice());

    match solve_distributed(&ctx, input, &params, &config) {
        Ok(Some(full)) => {
            let report = solve_serial(&u0, &params, &config)
                .and_then(|serial| l2_distance(&full, &serial));
            match report {
                Ok(err) => println!(
                    "P={}: max {:.6}, |parallel - serial| = {err:e}",
                    ctx.size(),
                    max_value(&full)
                ),
                Err(e) => {
                    eprintln!("mpi_heat: {e}");
                    std::process::exit(1);
                }
            }
        }
        Ok(None) => {}
        Err(e) => {
            eprintln!("mpi_heat: rank {}: {e}", ctx.rank());
            std::process::exit(1);
        }
    }
    ctx.comm().barrier();
}
