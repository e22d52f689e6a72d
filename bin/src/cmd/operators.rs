//! Operator listing command.

use ronda_ops::{ArgKind, available_operators};

/// Print the operator registry.
pub(crate) fn list_operators(verbose: bool) {
    let operators = available_operators();
    println!("Available operators ({}):\n", operators.len());

    for info in operators {
        if verbose {
            let args: Vec<&str> = info
                .args
                .iter()
                .map(|kind| match kind {
                    ArgKind::Series => "series",
                    ArgKind::Int => "int",
                    ArgKind::Arith => "+-*/|max|min",
                })
                .collect();
            println!("  {}({})", info.name, args.join(", "));
            println!("      {}", info.description);
        } else {
            println!("  {}", info.name);
        }
    }

    if !verbose {
        println!("\nUse --verbose for signatures and descriptions.");
    }
}
