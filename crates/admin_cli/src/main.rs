use std::error::Error;

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use engine::{
    CommissionFilter, CommissionStatus, Engine, LedgerCmd, MoneyCents, Order, Page,
    WalletTransactionFilter, WalletTransactionKind, WithdrawChannel, WithdrawalCmd,
    WithdrawalFilter, WithdrawalKind, WithdrawalStatus,
};
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection};
use serde::Serialize;

use settings::{Overrides, Settings};

mod settings;

#[derive(Parser, Debug)]
#[command(name = "ledger_admin")]
#[command(about = "Admin finance surface: wallets, distributors, commissions, withdrawals")]
struct Cli {
    /// Optional config file path (TOML).
    #[arg(long, global = true)]
    config: Option<String>,
    /// Database connection string (also read from `DATABASE_URL`).
    #[arg(long, global = true, env = "DATABASE_URL")]
    database_url: Option<String>,
    /// Log level for the admin tool and the engine.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Wallet(Wallet),
    Distributor(Distributor),
    Commission(Commission),
    Withdrawal(Withdrawal),
    Order(OrderEvent),
}

#[derive(Args, Debug)]
struct Wallet {
    #[command(subcommand)]
    command: WalletCommand,
}

#[derive(Subcommand, Debug)]
enum WalletCommand {
    Show { user_id: i64 },
    Recharge(LedgerArgs),
    Consume(LedgerArgs),
    Refund(LedgerArgs),
    Freeze(LedgerArgs),
    Unfreeze(LedgerArgs),
    Deduct(LedgerArgs),
    /// Print the wallet log, newest first.
    Log {
        user_id: i64,
        #[arg(long, value_parser = parse_wallet_kind)]
        kind: Option<WalletTransactionKind>,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Replay the wallet log and compare it with the stored balances.
    Audit { user_id: i64 },
}

#[derive(Args, Debug)]
struct LedgerArgs {
    user_id: i64,
    /// Amount in major units, e.g. `12.50`.
    amount: MoneyCents,
    #[arg(long)]
    reference_no: Option<String>,
    #[arg(long)]
    remark: Option<String>,
}

impl From<LedgerArgs> for LedgerCmd {
    fn from(args: LedgerArgs) -> Self {
        let mut cmd = LedgerCmd::new(args.user_id, args.amount.cents());
        cmd.reference_no = args.reference_no;
        cmd.remark = args.remark;
        cmd
    }
}

#[derive(Args, Debug)]
struct PageArgs {
    #[arg(long, default_value_t = 50)]
    limit: u64,
    #[arg(long, default_value_t = 0)]
    offset: u64,
}

impl From<PageArgs> for Page {
    fn from(args: PageArgs) -> Self {
        Page {
            limit: args.limit,
            offset: args.offset,
        }
    }
}

#[derive(Args, Debug)]
struct Distributor {
    #[command(subcommand)]
    command: DistributorCommand,
}

#[derive(Subcommand, Debug)]
enum DistributorCommand {
    Apply {
        user_id: i64,
        #[arg(long)]
        invite_code: Option<String>,
    },
    Approve {
        id: i64,
        #[arg(long)]
        operator: i64,
    },
    Reject {
        id: i64,
        #[arg(long)]
        operator: i64,
    },
    /// Look a distributor up by id, user or invite code.
    Show {
        #[arg(long, conflicts_with_all = ["user", "code"])]
        id: Option<i64>,
        #[arg(long, conflicts_with = "code")]
        user: Option<i64>,
        #[arg(long)]
        code: Option<String>,
    },
    /// Bind a consumer to the distributor owning `invite_code`.
    Bind { user_id: i64, invite_code: String },
    Team { id: i64 },
}

#[derive(Args, Debug)]
struct Commission {
    #[command(subcommand)]
    command: CommissionCommand,
}

#[derive(Subcommand, Debug)]
enum CommissionCommand {
    Settle { id: i64 },
    /// Settle every pending commission past the settlement delay.
    SettleDue,
    List {
        #[arg(long, conflicts_with = "order")]
        distributor: Option<i64>,
        #[arg(long)]
        order: Option<i64>,
        #[arg(long, value_parser = parse_commission_status)]
        status: Option<CommissionStatus>,
        #[command(flatten)]
        page: PageArgs,
    },
}

#[derive(Args, Debug)]
struct Withdrawal {
    #[command(subcommand)]
    command: WithdrawalCommand,
}

#[derive(Subcommand, Debug)]
enum WithdrawalCommand {
    Apply {
        user_id: i64,
        amount: MoneyCents,
        #[arg(long, value_parser = parse_withdrawal_kind, default_value = "commission")]
        kind: WithdrawalKind,
        #[arg(long = "to", value_parser = parse_channel)]
        withdraw_to: WithdrawChannel,
        #[arg(long)]
        account_info: Option<String>,
    },
    Approve {
        id: i64,
        #[arg(long)]
        operator: i64,
    },
    Process {
        id: i64,
        #[arg(long)]
        operator: i64,
    },
    Complete { id: i64 },
    Reject {
        id: i64,
        #[arg(long)]
        operator: i64,
        #[arg(long)]
        reason: String,
    },
    BatchApprove {
        #[arg(required = true)]
        ids: Vec<i64>,
        #[arg(long)]
        operator: i64,
    },
    BatchComplete {
        #[arg(required = true)]
        ids: Vec<i64>,
    },
    List {
        #[arg(long)]
        user: Option<i64>,
        #[arg(long, value_parser = parse_withdrawal_kind)]
        kind: Option<WithdrawalKind>,
        #[arg(long, value_parser = parse_withdrawal_status)]
        status: Option<WithdrawalStatus>,
        #[command(flatten)]
        page: PageArgs,
    },
}

/// Replay an order lifecycle event by hand.
#[derive(Args, Debug)]
struct OrderEvent {
    #[command(subcommand)]
    command: OrderCommand,
}

#[derive(Subcommand, Debug)]
enum OrderCommand {
    Completed(OrderArgs),
    Refunded(OrderArgs),
}

#[derive(Args, Debug)]
struct OrderArgs {
    order_id: i64,
    #[arg(long)]
    order_no: String,
    #[arg(long)]
    user: i64,
    amount: MoneyCents,
}

impl From<OrderArgs> for Order {
    fn from(args: OrderArgs) -> Self {
        Order::new(args.order_id, args.order_no, args.user, args.amount.cents())
    }
}

fn parse_wallet_kind(raw: &str) -> Result<WalletTransactionKind, String> {
    WalletTransactionKind::try_from(raw).map_err(|err| err.to_string())
}

fn parse_commission_status(raw: &str) -> Result<CommissionStatus, String> {
    CommissionStatus::try_from(raw).map_err(|err| err.to_string())
}

fn parse_withdrawal_kind(raw: &str) -> Result<WithdrawalKind, String> {
    WithdrawalKind::try_from(raw).map_err(|err| err.to_string())
}

fn parse_withdrawal_status(raw: &str) -> Result<WithdrawalStatus, String> {
    WithdrawalStatus::try_from(raw).map_err(|err| err.to_string())
}

fn parse_channel(raw: &str) -> Result<WithdrawChannel, String> {
    WithdrawChannel::try_from(raw).map_err(|err| err.to_string())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn Error + Send + Sync>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn connect_db(
    database_url: &str,
) -> Result<DatabaseConnection, Box<dyn Error + Send + Sync>> {
    let db = Database::connect(database_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

async fn run_wallet(
    engine: &Engine,
    command: WalletCommand,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    match command {
        WalletCommand::Show { user_id } => print_json(&engine.wallet(user_id).await?),
        WalletCommand::Recharge(args) => print_json(&engine.recharge(args.into()).await?),
        WalletCommand::Consume(args) => print_json(&engine.consume(args.into()).await?),
        WalletCommand::Refund(args) => print_json(&engine.refund(args.into()).await?),
        WalletCommand::Freeze(args) => print_json(&engine.freeze_deposit(args.into()).await?),
        WalletCommand::Unfreeze(args) => {
            print_json(&engine.unfreeze_deposit(args.into()).await?)
        }
        WalletCommand::Deduct(args) => {
            print_json(&engine.deduct_frozen_to_consume(args.into()).await?)
        }
        WalletCommand::Log {
            user_id,
            kind,
            page,
        } => {
            let filter = WalletTransactionFilter {
                kind,
                page: page.into(),
            };
            print_json(&engine.wallet_transactions(user_id, &filter).await?)
        }
        WalletCommand::Audit { user_id } => {
            let wallet = engine.audit_wallet(user_id).await?;
            println!(
                "wallet {user_id} consistent: balance {}, frozen {}",
                MoneyCents::new(wallet.balance),
                MoneyCents::new(wallet.frozen_balance)
            );
            Ok(())
        }
    }
}

async fn run_distributor(
    engine: &Engine,
    command: DistributorCommand,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    match command {
        DistributorCommand::Apply {
            user_id,
            invite_code,
        } => print_json(
            &engine
                .apply_distributor(user_id, invite_code.as_deref())
                .await?,
        ),
        DistributorCommand::Approve { id, operator } => {
            print_json(&engine.approve_distributor(id, operator).await?)
        }
        DistributorCommand::Reject { id, operator } => {
            print_json(&engine.reject_distributor(id, operator).await?)
        }
        DistributorCommand::Show { id, user, code } => {
            let distributor = match (id, user, code) {
                (Some(id), _, _) => engine.distributor(id).await?,
                (None, Some(user), _) => engine.distributor_by_user(user).await?,
                (None, None, Some(code)) => engine.distributor_by_invite_code(&code).await?,
                (None, None, None) => return Err("one of --id, --user or --code is required".into()),
            };
            print_json(&distributor)
        }
        DistributorCommand::Bind {
            user_id,
            invite_code,
        } => print_json(&engine.bind_referrer(user_id, &invite_code).await?),
        DistributorCommand::Team { id } => print_json(&engine.team_members(id).await?),
    }
}

async fn run_commission(
    engine: &Engine,
    command: CommissionCommand,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    match command {
        CommissionCommand::Settle { id } => print_json(&engine.settle_commission(id).await?),
        CommissionCommand::SettleDue => {
            print_json(&engine.settle_due_commissions(Utc::now()).await?)
        }
        CommissionCommand::List {
            distributor,
            order,
            status,
            page,
        } => match (distributor, order) {
            (Some(distributor), _) => {
                let filter = CommissionFilter {
                    status,
                    page: page.into(),
                };
                print_json(&engine.distributor_commissions(distributor, &filter).await?)
            }
            (None, Some(order)) => print_json(&engine.commissions_by_order(order).await?),
            (None, None) => Err("one of --distributor or --order is required".into()),
        },
    }
}

async fn run_withdrawal(
    engine: &Engine,
    command: WithdrawalCommand,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    match command {
        WithdrawalCommand::Apply {
            user_id,
            amount,
            kind,
            withdraw_to,
            account_info,
        } => {
            let mut cmd = WithdrawalCmd::new(user_id, kind, amount.cents(), withdraw_to);
            cmd.account_info = account_info;
            print_json(&engine.apply_withdrawal(cmd).await?)
        }
        WithdrawalCommand::Approve { id, operator } => {
            print_json(&engine.approve_withdrawal(id, operator).await?)
        }
        WithdrawalCommand::Process { id, operator } => {
            print_json(&engine.process_withdrawal(id, operator).await?)
        }
        WithdrawalCommand::Complete { id } => print_json(&engine.complete_withdrawal(id).await?),
        WithdrawalCommand::Reject {
            id,
            operator,
            reason,
        } => print_json(&engine.reject_withdrawal(id, operator, &reason).await?),
        WithdrawalCommand::BatchApprove { ids, operator } => {
            print_json(&engine.batch_approve_withdrawals(&ids, operator).await)
        }
        WithdrawalCommand::BatchComplete { ids } => {
            print_json(&engine.batch_complete_withdrawals(&ids).await)
        }
        WithdrawalCommand::List {
            user,
            kind,
            status,
            page,
        } => {
            let filter = WithdrawalFilter {
                user_id: user,
                kind,
                status,
                page: page.into(),
            };
            print_json(&engine.withdrawals(&filter).await?)
        }
    }
}

async fn run_order(
    engine: &Engine,
    command: OrderCommand,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    match command {
        OrderCommand::Completed(args) => {
            print_json(&engine.on_order_completed(&args.into()).await?)
        }
        OrderCommand::Refunded(args) => print_json(&engine.on_order_refunded(&args.into()).await?),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();
    let settings = Settings::load(Overrides {
        config: cli.config,
        database_url: cli.database_url,
        log_level: cli.log_level,
    })?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "ledger_admin={level},engine={level}",
            level = settings.log_level
        ))
        .with_writer(std::io::stderr)
        .init();

    let db = connect_db(&settings.database_url).await?;
    tracing::debug!("connected to {} with {:?}", settings.database_url, settings.finance);
    let engine = Engine::builder()
        .database(db)
        .settings(settings.finance)
        .build()
        .await?;

    match cli.command {
        Command::Wallet(Wallet { command }) => run_wallet(&engine, command).await,
        Command::Distributor(Distributor { command }) => run_distributor(&engine, command).await,
        Command::Commission(Commission { command }) => run_commission(&engine, command).await,
        Command::Withdrawal(Withdrawal { command }) => run_withdrawal(&engine, command).await,
        Command::Order(OrderEvent { command }) => run_order(&engine, command).await,
    }
}
