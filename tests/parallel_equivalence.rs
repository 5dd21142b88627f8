mod util;
use util::*;

use heat_halo::prelude::*;

#[test]
fn reference_problem_matches_serial_for_every_worker_count() {
    let params = ProblemParams::reference(N_REF, 100);
    let cfg = quick_config();
    for workers in WORKERS {
        // ones over the first chunk, zeros elsewhere
        let u0 = step_function(N_REF, N_REF / workers);
        let serial = solve_serial(&u0, &params, &cfg).unwrap();
        let parallel = run_local(workers, &u0, &params, &cfg).unwrap();
        let err = l2_distance(&parallel, &serial).unwrap();
        assert!(err < 1e-8, "P={workers}: |parallel - serial| = {err:e}");
        assert_bitwise_eq(&parallel, &serial);
    }
}

#[test]
fn one_step_agrees_at_every_chunk_boundary() {
    let u0 = random_state(N_REF, 42);
    let params = ProblemParams::reference(N_REF, 1);
    let cfg = quick_config();
    let serial = solve_serial(&u0, &params, &cfg).unwrap();
    for workers in WORKERS.into_iter().filter(|&p| p > 1) {
        let layout = ChunkLayout::new(N_REF, workers).unwrap();
        let parallel = run_local(workers, &u0, &params, &cfg).unwrap();
        for rank in 1..workers {
            let start = layout.offset(rank);
            for i in [start - 1, start] {
                assert_eq!(
                    parallel[i].to_bits(),
                    serial[i].to_bits(),
                    "P={workers}: index {i} next to the rank {rank} boundary"
                );
            }
        }
    }
}

#[test]
fn periodic_parallel_matches_periodic_serial() {
    let u0 = random_state(48, 3);
    let params = ProblemParams::reference(48, 60);
    let cfg = quick_config().with_boundary(BoundaryCondition::Periodic);
    let serial = solve_serial(&u0, &params, &cfg).unwrap();
    for workers in [1, 2, 3, 4, 6, 8, 12] {
        let parallel = run_local(workers, &u0, &params, &cfg).unwrap();
        assert_bitwise_eq(&parallel, &serial);
    }
}

#[test]
fn nonzero_dirichlet_value_matches_serial() {
    let u0 = random_state(30, 9);
    let params = ProblemParams::reference(30, 25);
    let cfg = quick_config().with_boundary(BoundaryCondition::Dirichlet(0.75));
    let serial = solve_serial(&u0, &params, &cfg).unwrap();
    let parallel = run_local(5, &u0, &params, &cfg).unwrap();
    assert_bitwise_eq(&parallel, &serial);
    assert_eq!((parallel[0], parallel[29]), (0.75, 0.75));
}

#[test]
fn one_point_per_worker() {
    let u0 = random_state(6, 5);
    let params = ProblemParams::reference(6, 10);
    let cfg = quick_config();
    let serial = solve_serial(&u0, &params, &cfg).unwrap();
    assert_bitwise_eq(&run_local(6, &u0, &params, &cfg).unwrap(), &serial);
}

#[test]
fn zero_steps_returns_the_initial_condition() {
    let u0 = random_state(24, 1);
    let params = ProblemParams::reference(24, 0);
    let got = run_local(3, &u0, &params, &quick_config()).unwrap();
    assert_bitwise_eq(&got, &u0);
}

#[test]
fn explicit_workers_step_through_the_state_machine() {
    let u0 = step_function(12, 3);
    let params = ProblemParams::reference(12, 4);
    let cfg = quick_config();
    let chunks = scatter_chunks(&u0, 3).unwrap();

    let finals: Vec<Vec<f64>> = std::thread::scope(|s| {
        let handles: Vec<_> = LocalComm::world(3)
            .into_iter()
            .zip(chunks)
            .map(|(comm, chunk)| {
                let cfg = cfg.clone();
                s.spawn(move || {
                    let ctx = WorkerContext::new(comm).unwrap();
                    let mut solver = ChunkSolver::new(&ctx, chunk, params, cfg).unwrap();
                    let mut exchanges = 0;
                    loop {
                        match solver.advance().unwrap() {
                            WorkerPhase::ExchangingHalo { .. } => exchanges += 1,
                            WorkerPhase::Done => break,
                            _ => {}
                        }
                    }
                    assert_eq!(exchanges, params.nt);
                    assert_eq!(solver.steps_done(), params.nt);
                    solver.chunk().to_vec()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let serial = solve_serial(&u0, &params, &cfg).unwrap();
    assert_bitwise_eq(&gather_chunks(&finals).unwrap(), &serial);
}
