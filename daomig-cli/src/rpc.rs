//! JSON-RPC Ledger Gateway over HTTP.
//!
//! Transactions are signed by the node (`eth_sendTransaction` from the
//! configured deployer account). Receipts are polled until they appear or the
//! configured confirmation timeout elapses.

use std::time::{Duration, Instant};

use ethers::providers::{Http, Middleware, Provider, ProviderError, RpcError};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{BlockNumber, TransactionReceipt, TransactionRequest, H160, H256};
use tokio::runtime::Runtime;
use tracing::{debug, info};

use daomig_core::{Address, Bytes, Bytes32, NetworkConfig};
use daomig_engine::{GatewayError, LedgerGateway, Log, Receipt};

pub struct RpcGateway {
    provider: Provider<Http>,
    runtime: Runtime,
    from: H160,
    confirmation_timeout: Duration,
    poll_interval: Duration,
}

fn provider_error(method: &str, err: ProviderError) -> GatewayError {
    match err.as_error_response() {
        Some(rpc) => GatewayError::Rpc {
            code: rpc.code,
            message: rpc.message.clone(),
        },
        None => GatewayError::Transport(format!("{method}: {err}")),
    }
}

fn into_receipt(raw: TransactionReceipt) -> Receipt {
    Receipt {
        tx_hash: Bytes32::from(raw.transaction_hash),
        block_number: raw.block_number.map_or(0, |n| n.as_u64()),
        gas_used: raw.gas_used.map_or(0, |g| g.low_u64()),
        // absent on pre-Byzantium chains
        status: raw.status.map_or(true, |s| s.as_u64() == 1),
        contract_address: raw.contract_address.map(Address::from),
        logs: raw
            .logs
            .into_iter()
            .map(|l| Log {
                address: Address::from(l.address),
                topics: l.topics.into_iter().map(Bytes32::from).collect(),
                data: l.data,
            })
            .collect(),
    }
}

impl RpcGateway {
    pub fn new(network: &NetworkConfig) -> Result<Self, GatewayError> {
        let provider = Provider::<Http>::try_from(network.rpc_url.as_str())
            .map_err(|e| GatewayError::Transport(format!("invalid RPC URL {}: {e}", network.rpc_url)))?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| GatewayError::Transport(format!("cannot start the RPC runtime: {e}")))?;
        Ok(Self {
            provider,
            runtime,
            from: H160::from(network.deployer),
            confirmation_timeout: Duration::from_secs(network.confirmation_timeout_secs),
            poll_interval: Duration::from_millis(network.poll_interval_ms),
        })
    }

    fn wait_for_receipt(&mut self, tx_hash: H256) -> Result<Receipt, GatewayError> {
        let started = Instant::now();
        loop {
            let found = self
                .runtime
                .block_on(self.provider.get_transaction_receipt(tx_hash))
                .map_err(|e| provider_error("eth_getTransactionReceipt", e))?;
            if let Some(raw) = found {
                return Ok(into_receipt(raw));
            }
            if started.elapsed() >= self.confirmation_timeout {
                return Err(GatewayError::Timeout {
                    tx_hash: Bytes32::from(tx_hash),
                    secs: self.confirmation_timeout.as_secs(),
                });
            }
            debug!(tx = %Bytes32::from(tx_hash), "waiting for receipt");
            std::thread::sleep(self.poll_interval);
        }
    }
}

impl LedgerGateway for RpcGateway {
    fn send_raw(&mut self, to: Option<Address>, data: &[u8]) -> Result<Receipt, GatewayError> {
        let mut tx = TransactionRequest::new().from(self.from).data(data.to_vec());
        if let Some(to) = to {
            tx = tx.to(H160::from(to));
        }
        let tx_hash = self
            .runtime
            .block_on(async { self.provider.send_transaction(tx, None).await.map(|pending| pending.tx_hash()) })
            .map_err(|e| provider_error("eth_sendTransaction", e))?;
        info!(tx = %Bytes32::from(tx_hash), "broadcast");

        let receipt = self.wait_for_receipt(tx_hash)?;
        if !receipt.status {
            return Err(GatewayError::Reverted {
                tx_hash: receipt.tx_hash,
            });
        }
        Ok(receipt)
    }

    fn call_raw(&mut self, to: Address, data: &[u8]) -> Result<Bytes, GatewayError> {
        let call: TypedTransaction = TransactionRequest::new()
            .from(self.from)
            .to(H160::from(to))
            .data(data.to_vec())
            .into();
        self.runtime
            .block_on(self.provider.call(&call, None))
            .map_err(|e| provider_error("eth_call", e))
    }

    fn get_code(&mut self, address: Address) -> Result<Bytes, GatewayError> {
        self.runtime
            .block_on(self.provider.get_code(H160::from(address), None))
            .map_err(|e| provider_error("eth_getCode", e))
    }

    fn get_transaction_count(&mut self, account: Address) -> Result<u64, GatewayError> {
        // "pending" counts broadcast transactions that are not mined yet.
        let count = self
            .runtime
            .block_on(
                self.provider
                    .get_transaction_count(H160::from(account), Some(BlockNumber::Pending.into())),
            )
            .map_err(|e| provider_error("eth_getTransactionCount", e))?;
        u64::try_from(count).map_err(|_| GatewayError::Transport(format!("transaction count {count} does not fit in 64 bits")))
    }
}
