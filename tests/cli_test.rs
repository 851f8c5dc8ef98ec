mod common;

use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use common::{CONTRACTS_HEADER, TRANSACTIONS_HEADER, csv_file};
use predicates::prelude::*;
use std::process::Command;

const COFFEE_PACT: &str = "7,COFFEE,50,20,Flat Earth Society,,2026-03-01,30,pm_card_visa,cus_7,";

fn pactkeeper() -> Command {
    let mut cmd = Command::new(cargo_bin!("pactkeeper"));
    cmd.env_remove("PACTKEEPER_TODAY")
        .env_remove("PACTKEEPER_DANGER_THRESHOLD")
        .env_remove("PACTKEEPER_PLATFORM_FEE_BPS")
        .env_remove("PACTKEEPER_FEED_TIMEOUT_SECS");
    cmd
}

#[test]
fn test_cli_breach_is_charged() -> Result<(), Box<dyn std::error::Error>> {
    let transactions = csv_file(&[
        TRANSACTIONS_HEADER,
        "7,t1,Blue Bottle,30.00,2026-03-02,COFFEE",
        "7,t2,Blue Bottle,25.00,2026-03-03,COFFEE",
        "7,t3,Whole Foods,80.00,2026-03-03,GROCERIES",
    ]);
    let contracts = csv_file(&[CONTRACTS_HEADER, COFFEE_PACT]);

    let mut cmd = pactkeeper();
    cmd.arg(transactions.path())
        .arg("--contracts")
        .arg(contracts.path())
        .arg("--today")
        .arg("2026-03-03");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "user,contract,category,spent,limit,percentage,days_remaining,status,display,payment_status,penalty,charge_reference,evaluated",
        ))
        .stdout(predicate::str::contains(
            "7,1,COFFEE,55.00,50.00,110.0,28,lost,lost,charged,collected,ch_sim_000001,true",
        ));

    Ok(())
}

#[test]
fn test_cli_expiry_is_won() {
    let transactions = csv_file(&[TRANSACTIONS_HEADER, "7,t1,Blue Bottle,10.00,2026-03-02,COFFEE"]);
    let contracts = csv_file(&[CONTRACTS_HEADER, COFFEE_PACT]);

    let mut cmd = pactkeeper();
    cmd.arg(transactions.path())
        .arg("--contracts")
        .arg(contracts.path())
        .env("PACTKEEPER_TODAY", "2026-04-01");

    cmd.assert().success().stdout(predicate::str::contains(
        "7,1,COFFEE,10.00,50.00,20.0,0,won,won,card_saved,not_due,,true",
    ));
}

#[test]
fn test_cli_danger_threshold() {
    let transactions = csv_file(&[TRANSACTIONS_HEADER, "7,t1,Blue Bottle,40.00,2026-03-02,COFFEE"]);
    let contracts = csv_file(&[CONTRACTS_HEADER, COFFEE_PACT]);

    let mut cmd = pactkeeper();
    cmd.arg(transactions.path())
        .arg("--contracts")
        .arg(contracts.path())
        .args(["--today", "2026-03-11"]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("80.0,20,active,danger,"));

    let mut cmd = pactkeeper();
    cmd.arg(transactions.path())
        .arg("--contracts")
        .arg(contracts.path())
        .args(["--today", "2026-03-11"])
        .env("PACTKEEPER_DANGER_THRESHOLD", "90");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("80.0,20,active,on_track,"));
}

#[test]
fn test_cli_declined_charge_is_pending() {
    let transactions = csv_file(&[TRANSACTIONS_HEADER, "7,t1,Blue Bottle,60.00,2026-03-02,COFFEE"]);
    let contracts = csv_file(&[CONTRACTS_HEADER, COFFEE_PACT]);

    let mut cmd = pactkeeper();
    cmd.arg(transactions.path())
        .arg("--contracts")
        .arg(contracts.path())
        .args(["--today", "2026-03-02", "--decline-charges"]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("lost,lost,failed,pending,,true"));
}

#[test]
fn test_cli_manual_transactions_are_merged() {
    let transactions = csv_file(&[TRANSACTIONS_HEADER, "7,t1,Blue Bottle,30.00,2026-03-02,COFFEE"]);
    let manual = csv_file(&[TRANSACTIONS_HEADER, "7,m1,Kiosk,30.00,2026-03-03,COFFEE"]);
    let contracts = csv_file(&[CONTRACTS_HEADER, COFFEE_PACT]);

    let mut cmd = pactkeeper();
    cmd.arg(transactions.path())
        .arg("--mock-transactions")
        .arg(manual.path())
        .arg("--contracts")
        .arg(contracts.path())
        .args(["--today", "2026-03-04"]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("7,1,COFFEE,60.00,50.00,120.0,27,lost,lost,charged"));
}

#[test]
fn test_cli_organization_recipient() {
    let transactions = csv_file(&[TRANSACTIONS_HEADER, "7,t1,Blue Bottle,60.00,2026-03-02,COFFEE"]);
    let organizations = csv_file(&[
        "id,name,description,category,payout_destination",
        "3,Rival Club,The other team,sports,acct_rival",
    ]);
    let contracts = csv_file(&[
        CONTRACTS_HEADER,
        "7,COFFEE,50,20,,3,2026-03-01,30,pm_card_visa,cus_7,",
        "8,COFFEE,50,20,,4,2026-03-01,30,pm_card_visa,cus_8,",
    ]);

    let mut cmd = pactkeeper();
    cmd.arg(transactions.path())
        .arg("--organizations")
        .arg(organizations.path())
        .arg("--contracts")
        .arg(contracts.path())
        .args(["--today", "2026-03-02"]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("lost,lost,charged,collected"))
        .stdout(predicate::str::contains("\n8,").not())
        .stderr(predicate::str::contains("Contract rejected"));
}

#[test]
fn test_cli_rejects_invalid_contracts() {
    let transactions = csv_file(&[TRANSACTIONS_HEADER]);
    let contracts = csv_file(&[
        CONTRACTS_HEADER,
        "7,TEA,50,20,Flat Earth Society,,2026-03-01,30,,,",
        "7,COFFEE,0,20,Flat Earth Society,,2026-03-01,30,,,",
        "7,COFFEE,50,20,Flat Earth Society,,2026-03-01,0,,,",
    ]);

    let mut cmd = pactkeeper();
    cmd.arg(transactions.path())
        .arg("--contracts")
        .arg(contracts.path())
        .args(["--today", "2026-03-02"]);

    cmd.assert()
        .success()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Contract rejected"));
}

#[test]
fn test_cli_unreadable_feed_leaves_contracts_unevaluated() {
    let contracts = csv_file(&[CONTRACTS_HEADER, COFFEE_PACT]);
    let dir = tempfile::tempdir().unwrap();

    let mut cmd = pactkeeper();
    cmd.arg(dir.path().join("missing.csv"))
        .arg("--contracts")
        .arg(contracts.path())
        .args(["--today", "2026-03-02"]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "7,1,COFFEE,,50.00,,,active,,card_saved,not_due,,false",
        ))
        .stderr(predicate::str::contains("Could not evaluate contracts"));
}

#[test]
fn test_cli_requires_transactions() {
    let mut cmd = pactkeeper();
    cmd.assert().failure();
}
