use anyhow::{Result, anyhow};
use clap::Parser;
use proposer_sync::{
    codec::{STATE_SYNC_DEFAULT_VERSION, split_version, state_sync_codec},
    summary::{Summary, SummaryHash, SummaryKey, WrappedSummaryContent},
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Decodes a wrapped state summary and prints what it refers to.
#[derive(Parser, Debug)]
struct Args {
    /// The hex-encoded summary, as exchanged between peers.
    #[clap(long)]
    summary: String,
    #[clap(long, default_value = "false")]
    log_json: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let builder = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_line_number(true)
        .with_ansi(false);
    if args.log_json {
        builder.json().init();
    } else {
        builder.init();
    }

    let summary = Summary(hex::decode(args.summary.trim().trim_start_matches("0x"))?);
    let (version, _) = split_version(summary.as_bytes())?;
    debug!(version, len = summary.len(), "decoding summary");
    if version != STATE_SYNC_DEFAULT_VERSION {
        return Err(anyhow!(
            "summary has version {version}, expected {STATE_SYNC_DEFAULT_VERSION}"
        ));
    }

    let (_, content) = state_sync_codec().decode::<WrappedSummaryContent>(summary.as_bytes())?;

    let key = SummaryKey::from_height(content.core.height);
    println!("key:            {}", hex::encode(key.as_bytes()));
    println!("hash:           {}", SummaryHash::compute(&summary));
    println!("height:         {}", content.core.height);
    println!("outer block ID: {}", content.outer_block_id);
    println!("core block ID:  {}", content.core.block_id);
    if content.outer_block_id == content.core.block_id {
        println!("(pre-fork checkpoint: outer and core block IDs coincide)");
    }

    Ok(())
}
