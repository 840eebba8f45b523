use min_cost_flow::minimum_cost_flow::{Cs2, FileFormat, McfSolver, Network, Status};

fn main() {
    let net = Network::new(4)
        .deficit(0, -4)
        .deficit(3, 4)
        .arc(1, 2, 3, 1)
        .arc(1, 3, 3, 2)
        .arc(2, 4, 3, 1)
        .arc(3, 4, 3, 1)
        .arc(2, 3, 2, 0);

    let mut solver: Cs2<i64, i64> = Cs2::default();
    solver.load_net(4, 5, &net).unwrap();

    match solver.solve().unwrap() {
        Status::Optimal => {
            println!("minimum cost:{}", solver.get_fo());
            let mut x = vec![0i64; solver.num_arcs()];
            solver.get_x(&mut x, None, 0..usize::MAX).unwrap();
            for (k, flow) in x.iter().enumerate() {
                println!(
                    "arc {} -> {}: {flow}/{}",
                    solver.arc_tail(k).unwrap(),
                    solver.arc_head(k).unwrap(),
                    solver.arc_cap(k).unwrap()
                );
            }
            let mut out = Vec::new();
            solver.write(&mut out, FileFormat::Dimacs).unwrap();
            print!("{}", String::from_utf8(out).unwrap());
        }
        status => println!("solve ended with {status:?}"),
    }
}
