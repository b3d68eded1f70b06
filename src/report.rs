// Plain-text rendering of analysis results. Output only: nothing here
// mutates or recomputes the data it is handed.
use crate::model::{ClusterAssignment, CorrelationMatrix, RollingResult, StrongPair, SweepPoint};

pub fn print_correlation_matrix(matrix: &CorrelationMatrix) {
    println!("\nReturn correlation matrix:");
    let width = matrix
        .names
        .iter()
        .map(|n| n.len())
        .max()
        .unwrap_or(0)
        .max(7);

    print!("{:width$}", "", width = width + 1);
    for name in &matrix.names {
        print!("{:>width$}", name, width = width + 1);
    }
    println!();

    for i in 0..matrix.len() {
        print!("{:width$}", matrix.names[i], width = width + 1);
        for j in 0..matrix.len() {
            match matrix.get(i, j) {
                Some(r) => print!("{:>width$.3}", r, width = width + 1),
                None => print!("{:>width$}", "-", width = width + 1),
            }
        }
        println!();
    }
}

pub fn print_strong_pairs(pairs: &[StrongPair], threshold: f64) {
    println!("\nStrongly correlated pairs (|r| > {:.2}):", threshold);
    if pairs.is_empty() {
        println!("  none");
        return;
    }
    for pair in pairs {
        let direction = if pair.coefficient > 0.0 {
            "positive"
        } else {
            "negative"
        };
        println!(
            "  {} and {}: {:.3} ({})",
            pair.a, pair.b, pair.coefficient, direction
        );
    }
}

pub fn print_sweep(points: &[SweepPoint]) {
    println!("\nCluster-count sweep:");
    println!("  {:>3} {:>12} {:>12}", "k", "inertia", "silhouette");
    for p in points {
        println!("  {:>3} {:>12.4} {:>12.4}", p.k, p.inertia, p.silhouette);
    }
}

pub fn print_clusters(assignment: &ClusterAssignment, k: usize) {
    println!("\nCluster assignment (k = {}):", k);
    for (label, members) in assignment.groups(k).iter().enumerate() {
        println!("  cluster {}: {}", label, members.join(", "));
    }
}

/// One line per column: its latest defined value, or a note that the window
/// never filled.
pub fn print_rolling_summary(title: &str, result: &RollingResult) {
    println!("\n{} (latest values):", title);
    for (idx, column) in result.columns.iter().enumerate() {
        match result.last_defined(idx) {
            Some((date, value)) => println!("  {:20} {} {:+.4}", column, date, value),
            None => println!("  {:20} no full window", column),
        }
    }
}
