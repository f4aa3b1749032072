use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

fn quantia() -> Command {
    let mut cmd = Command::new(cargo_bin!("quantia"));
    cmd.env_remove("REDIS_URI").env_remove("WEBHOOK_ADDRESS");
    cmd
}

#[test]
fn test_pay_prints_pending_transaction() -> Result<(), Box<dyn std::error::Error>> {
    let output = quantia()
        .args(["pay", "--amount", "100.0", "--url", "https://hooks.example.com/pay"])
        .output()?;
    assert!(output.status.success());

    let tx: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(tx["status"], "pending");
    assert_eq!(tx["amount"], 100.0);
    assert!(!tx["id"].as_str().unwrap_or_default().is_empty());

    Ok(())
}

#[test]
fn test_pay_rejects_non_positive_amount() {
    for amount in ["0", "-5"] {
        quantia()
            .args(["pay", "--amount", amount, "--url", "https://hooks.example.com/pay"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("invalid amount"));
    }
}

#[test]
fn test_pay_rejects_invalid_url() {
    quantia()
        .args(["pay", "--amount", "10", "--url", "ftp://hooks.example.com"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid URL"));
}

#[test]
fn test_worker_rejects_invalid_url() {
    quantia()
        .args(["worker", "--url", "not-a-url"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid URL"));
}
