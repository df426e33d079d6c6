//! Compare Krum against the FedAvg baseline under an untargeted attack.

use cipherfed::aggregators::krum;
use cipherfed::fedavg;
use cipherfed::sim::toy_state;

fn main() {
    println!("Krum vs FedAvg under attack\n");
    println!("Scenario: 4 honest clients (values ~1.0), 1 Byzantine (value -50.0)\n");

    let mut updates: Vec<_> = (0..4).map(|i| toy_state(1.0 + i as f32 * 0.02)).collect();
    updates.push(toy_state(-50.0));

    let krum_result = krum::aggregate(&updates, 1).unwrap();
    let krum_value = krum_result.state.get("dense.weight").unwrap()[[0, 0]];

    let avg = fedavg(&updates, None).unwrap();
    let avg_value = avg.get("dense.weight").unwrap()[[0, 0]];

    let verdict = |v: f32| if (v - 1.0).abs() < 0.5 { "ROBUST" } else { "CORRUPTED" };

    println!(
        "{:<20} selected client {}  value {:>8.2}  {}",
        "Krum (f=1)",
        krum_result.selected,
        krum_value,
        verdict(krum_value)
    );
    println!(
        "{:<20} {:<18} value {:>8.2}  {}",
        "FedAvg (no defense)",
        "",
        avg_value,
        verdict(avg_value)
    );

    println!("\nKrum discards the outlier; FedAvg lets one attacker poison the mean.");
}
