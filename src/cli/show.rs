use super::context::open_ledger;
use quorum::ledger::{Record, RecordKind};

/// Print a single proposal as JSON
pub async fn proposal(config: Option<String>, index: u64) -> Result<(), Box<dyn std::error::Error>> {
    let ledger = open_ledger(config).await?;
    let view = ledger.get_proposal(index).await?;
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}

/// Print the durable record log, oldest first
pub async fn records(
    config: Option<String>,
    limit: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let ledger = open_ledger(config).await?;
    for record in ledger.records(limit).await? {
        println!("{}", describe(&record));
    }
    Ok(())
}

fn describe(record: &Record) -> String {
    let detail = match &record.kind {
        RecordKind::Submitted {
            owner,
            index,
            target,
            value,
            payload,
        } => format!(
            "#{} by {} to {} value={} payload=0x{}",
            index,
            owner,
            target,
            value,
            hex::encode(payload)
        ),
        RecordKind::Confirmed { owner, index }
        | RecordKind::Revoked { owner, index }
        | RecordKind::Executed { owner, index } => format!("#{} by {}", index, owner),
        RecordKind::Deposited {
            sender,
            amount,
            balance,
        } => format!("{} from {} balance={}", amount, sender, balance),
    };
    format!(
        "{:>6} {} {:<8} {}",
        record.seq,
        record.timestamp,
        record.label(),
        detail
    )
}
