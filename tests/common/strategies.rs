use ormquery_core::adapter::JoinSource;
use ormquery_core::plugins::joining::{JoinCatalogue, JoinOptions};
use proptest::prelude::*;

/// Prerequisite lists of an acyclic catalogue: join `i` may only require joins `< i`
pub fn join_dag_strategy() -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1usize..12).prop_flat_map(|size| {
        prop::collection::vec(prop::collection::vec(any::<bool>(), size), size).prop_map(
            |matrix| {
                matrix
                    .iter()
                    .enumerate()
                    .map(|(join, row)| (0..join).filter(|&required| row[required]).collect())
                    .collect()
            },
        )
    })
}

/// An acyclic catalogue together with a non-empty list of requested joins
pub fn join_request_strategy() -> impl Strategy<Value = (Vec<Vec<usize>>, Vec<usize>)> {
    join_dag_strategy().prop_flat_map(|dag| {
        let size = dag.len();
        (Just(dag), prop::collection::vec(0..size, 1..=size))
    })
}

pub fn join_name(index: usize) -> String {
    format!("j{index}")
}

/// Declare `dag` in shuffled-looking order (reverse) so declaration order never helps
pub fn catalogue_from_dag(dag: &[Vec<usize>]) -> JoinCatalogue {
    let mut catalogue = JoinCatalogue::new(JoinSource::table("root"));
    for (index, requires) in dag.iter().enumerate().rev() {
        let name = join_name(index);
        let options = requires.iter().fold(
            JoinOptions::on("root.id", format!("{name}.root_id")),
            |options, &required| options.requires(join_name(required)),
        );
        catalogue
            .declare(&name, options)
            .expect("generated joins are unique and complete");
    }
    catalogue
}
