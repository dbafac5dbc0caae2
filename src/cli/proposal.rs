//! Owner commands: submit, confirm, revoke, execute.

use super::context::open_ledger;
use quorum::Principal;

pub async fn submit(
    config: Option<String>,
    caller: Principal,
    target: Principal,
    value: u128,
    payload: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let payload = match payload {
        Some(hex_payload) => parse_payload(&hex_payload)?,
        None => Vec::new(),
    };

    let ledger = open_ledger(config).await?;
    let index = ledger.submit(caller, target, value, payload).await?;
    println!("Submitted proposal #{}", index);
    Ok(())
}

pub async fn confirm(
    config: Option<String>,
    caller: Principal,
    index: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let ledger = open_ledger(config).await?;
    ledger.confirm(caller, index).await?;
    let view = ledger.get_proposal(index).await?;
    println!(
        "Confirmed proposal #{} ({}/{})",
        index,
        view.confirmations,
        ledger.threshold()
    );
    Ok(())
}

pub async fn revoke(
    config: Option<String>,
    caller: Principal,
    index: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let ledger = open_ledger(config).await?;
    ledger.revoke(caller, index).await?;
    let view = ledger.get_proposal(index).await?;
    println!(
        "Revoked confirmation on proposal #{} ({}/{})",
        index,
        view.confirmations,
        ledger.threshold()
    );
    Ok(())
}

pub async fn execute(
    config: Option<String>,
    caller: Principal,
    index: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let ledger = open_ledger(config).await?;
    ledger.execute(caller, index).await?;
    println!("Executed proposal #{}", index);
    println!("Balance: {}", ledger.balance().await);
    Ok(())
}

/// Hex payload, with or without a `0x` prefix.
fn parse_payload(input: &str) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let digits = input.strip_prefix("0x").unwrap_or(input);
    hex::decode(digits).map_err(|e| format!("Invalid payload '{}': {}", input, e).into())
}
