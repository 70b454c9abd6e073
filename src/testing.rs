//! Fake collaborators for exercising the orchestrator
//!
//! The fakes share state the way the real collaborators do: [`FakeChainClient`]
//! signs with a [`FakeWallet`] and only accepts calls for the wallet's active
//! chain, and [`FakeAttestationService`] only knows burns that the chain
//! client actually executed. Balances move between accounts, so a scenario can
//! assert on where the money ended up as well as on recipient statuses.
//!
//! Every fake is cheap to clone; clones observe the same state.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use alloy_primitives::{address, Address, Bytes, TxHash, U256};
use async_trait::async_trait;

use crate::chain::Chain;
use crate::error::{BulkPayError, Result};
use crate::protocol::{
    AttestationStatus, BurnParams, FeeScheduleEntry, MessagesResponse, SignedMessage,
    SourceMessage, UsdcAmount,
};
use crate::traits::{AttestationService, ChainClient, Clock, Wallet, WalletSession};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Fake Wallet
// ============================================================================

#[derive(Debug)]
struct WalletState {
    installed: bool,
    connected: bool,
    account: Address,
    active_chain: u64,
    balances: HashMap<(u64, Address), U256>,
    failing_switches: HashSet<u64>,
    switch_log: Vec<u64>,
}

/// An in-memory wallet with a USDC ledger per chain
#[derive(Debug, Clone)]
pub struct FakeWallet {
    state: Arc<Mutex<WalletState>>,
}

impl FakeWallet {
    /// Account every fake wallet signs with
    pub const ACCOUNT: Address = address!("00000000000000000000000000000000000a11ce");

    fn with_state(installed: bool, connected: bool, chain_id: u64) -> Self {
        Self {
            state: Arc::new(Mutex::new(WalletState {
                installed,
                connected,
                account: Self::ACCOUNT,
                active_chain: chain_id,
                balances: HashMap::new(),
                failing_switches: HashSet::new(),
                switch_log: Vec::new(),
            })),
        }
    }

    /// A wallet already connected on `chain_id`
    pub fn connected(chain_id: u64) -> Self {
        Self::with_state(true, true, chain_id)
    }

    /// An installed wallet that has not granted account access yet
    pub fn disconnected(chain_id: u64) -> Self {
        Self::with_state(true, false, chain_id)
    }

    pub fn not_installed() -> Self {
        Self::with_state(false, false, 0)
    }

    pub fn account(&self) -> Address {
        lock(&self.state).account
    }

    /// Credits `owner` with `amount` USDC on `chain_id`
    pub fn fund(&self, chain_id: u64, owner: Address, amount: UsdcAmount) {
        let mut state = lock(&self.state);
        let balance = state.balances.entry((chain_id, owner)).or_default();
        *balance += amount.atomic();
    }

    pub fn balance(&self, chain_id: u64, owner: Address) -> UsdcAmount {
        let state = lock(&self.state);
        UsdcAmount::from_atomic(
            state
                .balances
                .get(&(chain_id, owner))
                .copied()
                .unwrap_or_default(),
        )
    }

    /// Simulates the operator switching networks in the wallet UI
    pub fn set_active_chain(&self, chain_id: u64) {
        lock(&self.state).active_chain = chain_id;
    }

    /// Makes every switch to `chain_id` fail
    pub fn fail_switch_to(&self, chain_id: u64) {
        lock(&self.state).failing_switches.insert(chain_id);
    }

    /// Chains requested through [`Wallet::switch_network`], in order
    pub fn switch_log(&self) -> Vec<u64> {
        lock(&self.state).switch_log.clone()
    }

    fn signer(&self) -> Result<(Address, u64)> {
        let state = lock(&self.state);
        if !state.connected {
            return Err(BulkPayError::WalletNotConnected);
        }
        Ok((state.account, state.active_chain))
    }

    fn debit(&self, chain_id: u64, owner: Address, amount: U256) -> Result<()> {
        let mut state = lock(&self.state);
        let balance = state.balances.entry((chain_id, owner)).or_default();
        if *balance < amount {
            return Err(BulkPayError::ChainOperationFailed(
                "ERC20: transfer amount exceeds balance".to_string(),
            ));
        }
        *balance -= amount;
        Ok(())
    }

    fn credit(&self, chain_id: u64, owner: Address, amount: U256) {
        let mut state = lock(&self.state);
        *state.balances.entry((chain_id, owner)).or_default() += amount;
    }
}

#[async_trait]
impl Wallet for FakeWallet {
    async fn connect(&self) -> Result<WalletSession> {
        let (address, chain_id) = {
            let mut state = lock(&self.state);
            if !state.installed {
                return Err(BulkPayError::WalletNotInstalled);
            }
            state.connected = true;
            (state.account, state.active_chain)
        };

        Ok(WalletSession {
            address,
            chain_id,
            balance: self.balance(chain_id, address),
        })
    }

    fn address(&self) -> Option<Address> {
        let state = lock(&self.state);
        state.connected.then_some(state.account)
    }

    async fn active_chain_id(&self) -> Result<u64> {
        self.signer().map(|(_, chain_id)| chain_id)
    }

    async fn switch_network(&self, chain_id: u64) -> Result<()> {
        let mut state = lock(&self.state);
        if !state.connected {
            return Err(BulkPayError::WalletNotConnected);
        }
        state.switch_log.push(chain_id);
        if state.failing_switches.contains(&chain_id) {
            return Err(BulkPayError::NetworkSwitchFailed {
                chain_id,
                reason: "chain not added to wallet".to_string(),
            });
        }
        state.active_chain = chain_id;
        Ok(())
    }

    async fn usdc_balance(&self, owner: Address) -> Result<UsdcAmount> {
        let (_, chain_id) = self.signer()?;
        Ok(self.balance(chain_id, owner))
    }
}

// ============================================================================
// Fake Chain Client
// ============================================================================

/// Mutating contract operations, for scripting failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainOp {
    Approve,
    Transfer,
    DepositForBurn,
    ReceiveMessage,
}

/// A mutating call that reached the fake chain, successful or not
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainCall {
    Approve {
        chain_id: u64,
        spender: Address,
        amount: UsdcAmount,
    },
    Transfer {
        chain_id: u64,
        to: Address,
        amount: UsdcAmount,
    },
    DepositForBurn {
        chain_id: u64,
        params: BurnParams,
    },
    ReceiveMessage {
        chain_id: u64,
        message: Bytes,
    },
}

impl ChainCall {
    pub fn op(&self) -> ChainOp {
        match self {
            Self::Approve { .. } => ChainOp::Approve,
            Self::Transfer { .. } => ChainOp::Transfer,
            Self::DepositForBurn { .. } => ChainOp::DepositForBurn,
            Self::ReceiveMessage { .. } => ChainOp::ReceiveMessage,
        }
    }
}

#[derive(Debug, Clone)]
enum ScriptedFailure {
    UserRejected,
    Revert(String),
}

#[derive(Debug, Clone)]
struct BurnRecord {
    params: BurnParams,
    minted: bool,
}

#[derive(Debug, Default)]
struct ChainState {
    next_tx: u64,
    calls: Vec<ChainCall>,
    failures: HashMap<ChainOp, VecDeque<ScriptedFailure>>,
    allowances: HashMap<(u64, Address, Address), U256>,
    gas_prices: HashMap<u64, u128>,
    gas_price_unavailable: bool,
}

type BurnLog = Arc<Mutex<HashMap<TxHash, BurnRecord>>>;

/// Token and CCTP contracts backed by a [`FakeWallet`]'s ledger
///
/// Burns debit the signer and are remembered by transaction hash; a
/// `receiveMessage` whose message is a known burn hash credits the mint
/// recipient on the destination chain.
#[derive(Debug, Clone)]
pub struct FakeChainClient {
    wallet: FakeWallet,
    state: Arc<Mutex<ChainState>>,
    burns: BurnLog,
}

impl FakeChainClient {
    /// Gas price reported when none was set for a chain: 1 gwei
    pub const DEFAULT_GAS_PRICE: u128 = 1_000_000_000;

    pub fn new(wallet: FakeWallet) -> Self {
        Self {
            wallet,
            state: Arc::new(Mutex::new(ChainState::default())),
            burns: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// The next `op` call is rejected in the wallet prompt
    pub fn reject_next(&self, op: ChainOp) {
        self.push_failure(op, ScriptedFailure::UserRejected);
    }

    /// The next `op` call reverts with `reason`
    pub fn revert_next(&self, op: ChainOp, reason: impl Into<String>) {
        self.push_failure(op, ScriptedFailure::Revert(reason.into()));
    }

    fn push_failure(&self, op: ChainOp, failure: ScriptedFailure) {
        lock(&self.state)
            .failures
            .entry(op)
            .or_default()
            .push_back(failure);
    }

    pub fn set_gas_price(&self, chain_id: u64, wei: u128) {
        lock(&self.state).gas_prices.insert(chain_id, wei);
    }

    /// Makes every gas price query fail
    pub fn set_gas_price_unavailable(&self, unavailable: bool) {
        lock(&self.state).gas_price_unavailable = unavailable;
    }

    /// Every mutating call attempted so far, in order
    pub fn calls(&self) -> Vec<ChainCall> {
        lock(&self.state).calls.clone()
    }

    pub fn calls_of(&self, op: ChainOp) -> Vec<ChainCall> {
        self.calls().into_iter().filter(|c| c.op() == op).collect()
    }

    /// Burn hashes that have not been minted yet
    pub fn unminted_burns(&self) -> Vec<TxHash> {
        lock(&self.burns)
            .iter()
            .filter(|(_, burn)| !burn.minted)
            .map(|(hash, _)| *hash)
            .collect()
    }

    /// Records the call, checks the signer is on `chain` and applies any
    /// scripted failure
    fn begin(&self, chain: &Chain, call: ChainCall) -> Result<Address> {
        let op = call.op();
        let scripted = {
            let mut state = lock(&self.state);
            state.calls.push(call);
            state.failures.get_mut(&op).and_then(VecDeque::pop_front)
        };

        let (signer, active_chain) = self.wallet.signer()?;
        if active_chain != chain.id {
            return Err(BulkPayError::ChainOperationFailed(format!(
                "signer is on chain {active_chain}, call targets chain {}",
                chain.id
            )));
        }

        match scripted {
            Some(ScriptedFailure::UserRejected) => Err(BulkPayError::UserRejected),
            Some(ScriptedFailure::Revert(reason)) => Err(BulkPayError::ChainOperationFailed(reason)),
            None => Ok(signer),
        }
    }

    fn next_tx_hash(&self) -> TxHash {
        let mut state = lock(&self.state);
        state.next_tx += 1;
        TxHash::left_padding_from(&state.next_tx.to_be_bytes())
    }
}

#[async_trait]
impl ChainClient for FakeChainClient {
    async fn balance_of(&self, chain: &Chain, owner: Address) -> Result<UsdcAmount> {
        Ok(self.wallet.balance(chain.id, owner))
    }

    async fn allowance(
        &self,
        chain: &Chain,
        owner: Address,
        spender: Address,
    ) -> Result<UsdcAmount> {
        let state = lock(&self.state);
        Ok(UsdcAmount::from_atomic(
            state
                .allowances
                .get(&(chain.id, owner, spender))
                .copied()
                .unwrap_or_default(),
        ))
    }

    async fn approve(&self, chain: &Chain, spender: Address, amount: UsdcAmount) -> Result<TxHash> {
        let signer = self.begin(
            chain,
            ChainCall::Approve {
                chain_id: chain.id,
                spender,
                amount,
            },
        )?;
        lock(&self.state)
            .allowances
            .insert((chain.id, signer, spender), amount.atomic());
        Ok(self.next_tx_hash())
    }

    async fn transfer(&self, chain: &Chain, to: Address, amount: UsdcAmount) -> Result<TxHash> {
        let signer = self.begin(
            chain,
            ChainCall::Transfer {
                chain_id: chain.id,
                to,
                amount,
            },
        )?;
        self.wallet.debit(chain.id, signer, amount.atomic())?;
        self.wallet.credit(chain.id, to, amount.atomic());
        Ok(self.next_tx_hash())
    }

    async fn deposit_for_burn(&self, chain: &Chain, params: &BurnParams) -> Result<TxHash> {
        let signer = self.begin(
            chain,
            ChainCall::DepositForBurn {
                chain_id: chain.id,
                params: params.clone(),
            },
        )?;

        let amount = params.amount.atomic();
        {
            let mut state = lock(&self.state);
            let allowance = state
                .allowances
                .entry((chain.id, signer, chain.token_messenger()))
                .or_default();
            if *allowance < amount {
                return Err(BulkPayError::ChainOperationFailed(
                    "ERC20: insufficient allowance".to_string(),
                ));
            }
            *allowance -= amount;
        }
        self.wallet.debit(chain.id, signer, amount)?;

        let tx_hash = self.next_tx_hash();
        lock(&self.burns).insert(
            tx_hash,
            BurnRecord {
                params: params.clone(),
                minted: false,
            },
        );
        Ok(tx_hash)
    }

    async fn receive_message(&self, chain: &Chain, signed: &SignedMessage) -> Result<TxHash> {
        self.begin(
            chain,
            ChainCall::ReceiveMessage {
                chain_id: chain.id,
                message: signed.message.clone(),
            },
        )?;

        let burn_hash = TxHash::try_from(signed.message.as_ref())
            .map_err(|_| BulkPayError::ChainOperationFailed("Invalid message".to_string()))?;
        let (recipient, amount) = {
            let mut burns = lock(&self.burns);
            let burn = burns
                .get_mut(&burn_hash)
                .ok_or_else(|| BulkPayError::ChainOperationFailed("Invalid message".to_string()))?;
            if burn.params.destination_domain != chain.domain {
                return Err(BulkPayError::ChainOperationFailed(
                    "Invalid destination domain".to_string(),
                ));
            }
            if burn.minted {
                return Err(BulkPayError::ChainOperationFailed(
                    "Nonce already used".to_string(),
                ));
            }
            burn.minted = true;
            (
                Address::from_word(burn.params.mint_recipient),
                burn.params.amount.atomic(),
            )
        };

        self.wallet.credit(chain.id, recipient, amount);
        Ok(self.next_tx_hash())
    }

    async fn gas_price(&self, chain: &Chain) -> Result<u128> {
        let state = lock(&self.state);
        if state.gas_price_unavailable {
            return Err(BulkPayError::ChainOperationFailed(
                "gas price unavailable".to_string(),
            ));
        }
        Ok(state
            .gas_prices
            .get(&chain.id)
            .copied()
            .unwrap_or(Self::DEFAULT_GAS_PRICE))
    }
}

// ============================================================================
// Fake Attestation Service
// ============================================================================

/// One scripted answer of [`FakeAttestationService::messages`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeAttestation {
    Pending,
    PendingConfirmations,
    /// `complete` but the attestation bytes are still missing
    CompleteWithoutAttestation,
    Complete,
    /// 404 from the service
    NotFound,
    Unavailable,
}

/// Attestation bytes every completed fake attestation carries
pub const FAKE_ATTESTATION: [u8; 65] = [0xaa; 65];

#[derive(Debug, Default)]
struct AttestationState {
    by_tx: HashMap<TxHash, Vec<FakeAttestation>>,
    by_recipient: HashMap<Address, Vec<FakeAttestation>>,
    cursors: HashMap<TxHash, usize>,
    queries: Vec<(u32, TxHash)>,
    fees: HashMap<(u32, u32), Vec<FeeScheduleEntry>>,
    fee_queries: Vec<(u32, u32)>,
    fee_outage: bool,
    fee_network_changed: bool,
}

/// Circle's attestation service, attesting the burns of a [`FakeChainClient`]
///
/// Unscripted burns attest on the first query. The signed message of a burn
/// is its transaction hash, which is what [`FakeChainClient::receive_message`]
/// expects.
#[derive(Debug, Clone)]
pub struct FakeAttestationService {
    burns: BurnLog,
    state: Arc<Mutex<AttestationState>>,
}

impl Default for FakeAttestationService {
    fn default() -> Self {
        Self {
            burns: Arc::new(Mutex::new(HashMap::new())),
            state: Arc::new(Mutex::new(AttestationState::default())),
        }
    }
}

impl FakeAttestationService {
    /// A service that knows every burn executed by `chain`
    pub fn new(chain: &FakeChainClient) -> Self {
        Self {
            burns: chain.burns.clone(),
            ..Self::default()
        }
    }

    /// Answers for a specific burn hash, in order; the last answer repeats
    pub fn script(&self, tx_hash: TxHash, answers: Vec<FakeAttestation>) {
        lock(&self.state).by_tx.insert(tx_hash, answers);
    }

    /// Answers for the burn paying `recipient`, in order; the last answer repeats
    pub fn script_recipient(&self, recipient: Address, answers: Vec<FakeAttestation>) {
        lock(&self.state).by_recipient.insert(recipient, answers);
    }

    /// The burn paying `recipient` never attests
    pub fn always_pending_for(&self, recipient: Address) {
        self.script_recipient(recipient, vec![FakeAttestation::Pending]);
    }

    pub fn set_fees(&self, source_domain: u32, destination_domain: u32, entries: Vec<FeeScheduleEntry>) {
        lock(&self.state)
            .fees
            .insert((source_domain, destination_domain), entries);
    }

    /// Makes every fee query fail as if the service were down
    pub fn set_fee_outage(&self, outage: bool) {
        lock(&self.state).fee_outage = outage;
    }

    /// Makes every fee query fail with a network-changed error
    pub fn set_fee_network_changed(&self, changed: bool) {
        lock(&self.state).fee_network_changed = changed;
    }

    /// Number of message queries made for `tx_hash`
    pub fn message_queries(&self, tx_hash: TxHash) -> usize {
        lock(&self.state)
            .queries
            .iter()
            .filter(|(_, hash)| *hash == tx_hash)
            .count()
    }

    pub fn total_message_queries(&self) -> usize {
        lock(&self.state).queries.len()
    }

    /// `(source, destination)` domain pairs of every fee query, in order
    pub fn fee_queries(&self) -> Vec<(u32, u32)> {
        lock(&self.state).fee_queries.clone()
    }

    fn response(tx_hash: TxHash, answer: FakeAttestation) -> Result<MessagesResponse> {
        let message = |status, attestation: Option<Bytes>| MessagesResponse {
            messages: vec![SourceMessage {
                status,
                message: Some(Bytes::copy_from_slice(tx_hash.as_slice())),
                attestation,
            }],
        };

        match answer {
            FakeAttestation::Pending => Ok(MessagesResponse {
                messages: vec![SourceMessage {
                    status: AttestationStatus::Pending,
                    message: None,
                    attestation: None,
                }],
            }),
            FakeAttestation::PendingConfirmations => {
                Ok(message(AttestationStatus::PendingConfirmations, None))
            }
            FakeAttestation::CompleteWithoutAttestation => {
                Ok(message(AttestationStatus::Complete, None))
            }
            FakeAttestation::Complete => Ok(message(
                AttestationStatus::Complete,
                Some(Bytes::copy_from_slice(&FAKE_ATTESTATION)),
            )),
            FakeAttestation::NotFound => Err(BulkPayError::AttestationNotFound),
            FakeAttestation::Unavailable => Err(BulkPayError::ServiceUnavailable(
                "simulated outage".to_string(),
            )),
        }
    }
}

#[async_trait]
impl AttestationService for FakeAttestationService {
    async fn messages(&self, source_domain: u32, tx_hash: TxHash) -> Result<MessagesResponse> {
        let recipient = lock(&self.burns)
            .get(&tx_hash)
            .map(|burn| Address::from_word(burn.params.mint_recipient));

        let mut state = lock(&self.state);
        state.queries.push((source_domain, tx_hash));

        let script = state
            .by_tx
            .get(&tx_hash)
            .or_else(|| recipient.and_then(|r| state.by_recipient.get(&r)))
            .cloned();

        let answer = match script {
            Some(answers) if !answers.is_empty() => {
                let cursor = state.cursors.entry(tx_hash).or_default();
                let answer = answers[(*cursor).min(answers.len() - 1)];
                *cursor += 1;
                answer
            }
            _ if recipient.is_some() => FakeAttestation::Complete,
            _ => FakeAttestation::NotFound,
        };

        Self::response(tx_hash, answer)
    }

    async fn fees(
        &self,
        source_domain: u32,
        destination_domain: u32,
    ) -> Result<Vec<FeeScheduleEntry>> {
        let mut state = lock(&self.state);
        state.fee_queries.push((source_domain, destination_domain));

        if state.fee_network_changed {
            return Err(BulkPayError::NetworkChanged);
        }
        if state.fee_outage {
            return Err(BulkPayError::ServiceUnavailable(
                "simulated outage".to_string(),
            ));
        }

        Ok(state
            .fees
            .get(&(source_domain, destination_domain))
            .cloned()
            .unwrap_or_default())
    }
}

// ============================================================================
// Fake Clock
// ============================================================================

type SleepHook = Arc<dyn Fn(Duration) + Send + Sync>;

/// A fake clock that allows fast-forwarding time in tests.
///
/// Sleeping never waits; it advances the clock and logs the duration.
#[derive(Clone)]
pub struct FakeClock {
    start: Instant,
    current_time: Arc<Mutex<Instant>>,
    sleep_log: Arc<Mutex<Vec<Duration>>>,
    hook: Arc<Mutex<Option<SleepHook>>>,
}

impl fmt::Debug for FakeClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FakeClock")
            .field("sleep_log", &self.sleep_log)
            .finish_non_exhaustive()
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            current_time: Arc::new(Mutex::new(now)),
            sleep_log: Arc::new(Mutex::new(Vec::new())),
            hook: Arc::new(Mutex::new(None)),
        }
    }
}

impl FakeClock {
    /// Unix time, in milliseconds, the clock starts at
    pub const START_UNIX_MILLIS: u64 = 1_700_000_000_000;

    pub fn new() -> Self {
        Self::default()
    }

    /// Fast-forward the clock by the given duration
    pub fn advance(&self, duration: Duration) {
        let mut time = lock(&self.current_time);
        *time += duration;
    }

    /// Runs `hook` on every sleep, after the clock has advanced
    pub fn on_sleep(&self, hook: impl Fn(Duration) + Send + Sync + 'static) {
        *lock(&self.hook) = Some(Arc::new(hook));
    }

    /// Get the total time "slept" by this clock
    pub fn total_sleep_time(&self) -> Duration {
        lock(&self.sleep_log).iter().sum()
    }

    /// Get the number of times sleep was called
    pub fn sleep_count(&self) -> usize {
        lock(&self.sleep_log).len()
    }

    pub fn sleep_log(&self) -> Vec<Duration> {
        lock(&self.sleep_log).clone()
    }

    /// Clear the sleep log
    pub fn clear_sleep_log(&self) {
        lock(&self.sleep_log).clear();
    }
}

#[async_trait]
impl Clock for FakeClock {
    async fn sleep(&self, duration: Duration) {
        lock(&self.sleep_log).push(duration);
        self.advance(duration);
        let hook = lock(&self.hook).clone();
        if let Some(hook) = hook {
            hook(duration);
        }
    }

    fn now(&self) -> Instant {
        *lock(&self.current_time)
    }

    fn unix_millis(&self) -> u64 {
        let elapsed = self.now().duration_since(self.start);
        Self::START_UNIX_MILLIS + elapsed.as_millis() as u64
    }
}
