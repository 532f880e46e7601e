pub mod config;

use std::path::PathBuf;

use bitcoin_block_index::BlockchainReader;
use bitcoin_blockfile::{BlockFile, Network};
use bitcoin_node_rpc::{NodeRpc, NodeRpcClient, RpcConfig};
use clap::{Parser, Subcommand};
use eyre::Result;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Node data directory, defaults to the platform's Bitcoin data directory
    #[arg(long, env = "BITCOIN_DATADIR", global = true)]
    pub datadir: Option<PathBuf>,

    /// Read testnet3 data and talk to a testnet node
    #[arg(long, env = "BITCOIN_TESTNET", global = true)]
    pub testnet: bool,

    /// Host of the node's JSON-RPC server
    #[arg(long, env = "BITCOIN_RPC_HOST", global = true, default_value = "127.0.0.1")]
    pub rpc_host: String,

    /// Port of the node's JSON-RPC server, defaults to 8332 (18332 on testnet)
    #[arg(long, env = "BITCOIN_RPC_PORT", global = true)]
    pub rpc_port: Option<u16>,

    /// RPC user
    #[arg(long, env = "BITCOIN_RPC_USER", global = true, default_value = "")]
    pub rpc_user: String,

    /// RPC password
    #[arg(
        long,
        env = "BITCOIN_RPC_PASS",
        global = true,
        default_value = "",
        hide_env_values = true
    )]
    pub rpc_pass: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Decode a block looked up by hash through the block index
    GetBlock { hash: String },
    /// Show the block index entry of a block
    GetBlockIndexRecord { hash: String },
    /// Decode the block whose header starts at <pos> in blk<file>.dat
    GetBlockFromFile { file: u32, pos: u64 },
    /// Decode a transaction looked up by txid (needs -txindex)
    GetTx { txid: String },
    /// Show the transaction index entry of a transaction
    GetTxIndexRecord { txid: String },
    /// Decode the transaction at <tx-pos> after the header of the block at <pos>
    GetTxFromFile { file: u32, pos: u64, tx_pos: u64 },
    /// Show the bookkeeping entry of a block file
    GetFileInfoRecord { file: u32 },
    /// Number of the block file the node currently appends to
    GetLastBlockFileNumberUsed,
    /// Value of a named flag, e.g. txindex
    GetFlag { name: String },
    /// Whether the node is reindexing
    GetReindexing,
    /// Summarise every block record in a block file
    ScanFile { file: u32 },
    /// List unspent outputs of the node's wallet
    ListUnspent,
    /// Txids in the node's mempool
    GetRawMempool,
    /// Broadcast a signed raw transaction
    SendRawTransaction { raw: String },
}

impl Command {
    fn uses_rpc(&self) -> bool {
        matches!(
            self,
            Command::ListUnspent | Command::GetRawMempool | Command::SendRawTransaction { .. }
        )
    }

    fn uses_index(&self) -> bool {
        !self.uses_rpc()
            && !matches!(
                self,
                Command::GetBlockFromFile { .. }
                    | Command::GetTxFromFile { .. }
                    | Command::ScanFile { .. }
            )
    }
}

#[derive(Debug, Serialize)]
struct RecordSummary {
    start_pos: u64,
    hash: String,
    length: u32,
    tx_count: u64,
    time: String,
}

fn to_json<T: Serialize>(value: T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

impl Cli {
    pub fn network(&self) -> Network {
        if self.testnet {
            Network::Testnet
        } else {
            Network::Mainnet
        }
    }

    pub fn datadir(&self) -> Result<PathBuf> {
        config::resolve_datadir(self.datadir.clone(), self.network())
    }

    pub fn rpc_config(&self) -> RpcConfig {
        let network = self.network();
        RpcConfig {
            host: self.rpc_host.clone(),
            port: self.rpc_port.unwrap_or(network.default_rpc_port()),
            user: self.rpc_user.clone(),
            pass: self.rpc_pass.clone(),
            network,
        }
    }

    /// Runs the selected command and returns what it prints.
    pub async fn execute(&self) -> Result<Value> {
        if self.command.uses_rpc() {
            self.execute_rpc().await
        } else {
            self.execute_local()
        }
    }

    pub async fn run(self) -> Result<()> {
        let output = self.execute().await?;
        println!("{}", serde_json::to_string_pretty(&output)?);
        Ok(())
    }

    fn execute_local(&self) -> Result<Value> {
        let datadir = self.datadir()?;
        let network = self.network();
        let blocks_dir = datadir.join("blocks");
        info!(
            datadir = %datadir.display(),
            %network,
            command = ?self.command,
            "Reading blockchain data"
        );

        if !self.command.uses_index() {
            return match &self.command {
                Command::GetBlockFromFile { file, pos } => {
                    to_json(BlockFile::open(&blocks_dir, *file, network)?.read_block(*pos)?)
                }
                Command::GetTxFromFile { file, pos, tx_pos } => to_json(
                    BlockFile::open(&blocks_dir, *file, network)?.read_transaction(*pos, *tx_pos)?,
                ),
                Command::ScanFile { file } => {
                    let mut records = Vec::new();
                    for block in BlockFile::open(&blocks_dir, *file, network)?.scan()? {
                        let block = block?;
                        records.push(RecordSummary {
                            start_pos: block.start_pos(),
                            hash: block.hash().to_string(),
                            length: block.length(),
                            tx_count: block.tx_count(),
                            time: block.header().timestamp().to_rfc3339(),
                        });
                    }
                    Ok(json!({ "file": file, "blocks": records.len(), "records": records }))
                }
                other => Err(eyre::eyre!("{other:?} needs the block index")),
            };
        }

        let mut reader = BlockchainReader::open(&datadir, network)?;
        match &self.command {
            Command::GetBlock { hash } => {
                let block = reader.get_block(hash)?;
                let coinbase_txid = block.transactions().first().map(|tx| tx.txid());
                Ok(json!({ "coinbase_txid": coinbase_txid, "block": to_json(&block)? }))
            }
            Command::GetBlockIndexRecord { hash } => to_json(reader.block_index_record(hash)?),
            Command::GetTx { txid } => to_json(reader.get_transaction(txid)?),
            Command::GetTxIndexRecord { txid } => to_json(reader.tx_index_record(txid)?),
            Command::GetFileInfoRecord { file } => to_json(reader.file_info_record(*file)?),
            Command::GetLastBlockFileNumberUsed => {
                to_json(reader.index().last_block_file_number_used()?)
            }
            Command::GetFlag { name } => {
                let value = reader.index().flag(name)?;
                Ok(json!({ "name": name, "value": value }))
            }
            Command::GetReindexing => to_json(reader.index().is_reindexing()?),
            other => Err(eyre::eyre!("{other:?} does not read the block index")),
        }
    }

    async fn execute_rpc(&self) -> Result<Value> {
        let client = NodeRpcClient::new(self.rpc_config());
        info!(url = %client.config().url(), command = ?self.command, "Calling node RPC");

        match &self.command {
            Command::ListUnspent => to_json(client.list_unspent().await?),
            Command::GetRawMempool => to_json(client.get_raw_mempool().await?),
            Command::SendRawTransaction { raw } => {
                let txid = client.send_raw_transaction(raw).await?;
                Ok(json!({ "txid": txid }))
            }
            other => Err(eyre::eyre!("{other:?} is not an RPC command")),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use bitcoin_blockfile::block_file_path;
    use test_data_utils::{BlockFileImage, GENESIS_BLOCK, GENESIS_BLOCK_HASH};

    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("blockchain-parser").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_parse_subcommands() {
        let cli = parse(&["--datadir", "/tmp/node", "get-tx-from-file", "3", "1000", "81"]);
        assert_eq!(
            cli.command,
            Command::GetTxFromFile {
                file: 3,
                pos: 1000,
                tx_pos: 81
            }
        );
        assert_eq!(cli.datadir().unwrap(), PathBuf::from("/tmp/node"));

        let cli = parse(&["get-flag", "txindex", "--testnet"]);
        assert_eq!(cli.command, Command::GetFlag { name: "txindex".into() });
        assert_eq!(cli.network(), Network::Testnet);
    }

    #[test]
    fn test_rpc_config_defaults() {
        let cli = parse(&["--testnet", "--rpc-user", "alice", "get-raw-mempool"]);
        let config = cli.rpc_config();

        assert_eq!(config.port, 18332);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.user, "alice");
        assert!(cli.command.uses_rpc());

        let cli = parse(&["--rpc-port", "9000", "list-unspent"]);
        assert_eq!(cli.rpc_config().port, 9000);
    }

    #[tokio::test]
    async fn test_scan_file_command() {
        let dir = tempfile::tempdir().unwrap();
        let blocks_dir = dir.path().join("blocks");
        fs::create_dir_all(&blocks_dir).unwrap();

        let mut image = BlockFileImage::new();
        let data_pos = image.push_record(Network::Mainnet.magic(), &GENESIS_BLOCK);
        fs::write(block_file_path(&blocks_dir, 0), image.padding(32).into_bytes()).unwrap();

        let datadir = dir.path().to_str().unwrap();
        let output = parse(&["--datadir", datadir, "scan-file", "0"])
            .execute()
            .await
            .unwrap();
        assert_eq!(output["blocks"], 1);
        assert_eq!(output["records"][0]["hash"], GENESIS_BLOCK_HASH);

        let pos = data_pos.to_string();
        let output = parse(&["--datadir", datadir, "get-block-from-file", "0", &pos])
            .execute()
            .await
            .unwrap();
        assert_eq!(output["header"]["hash"], GENESIS_BLOCK_HASH);
    }
}
