use anyhow::{bail, Context};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;
use std::str::FromStr;
use voucher_core::workflow::{self, Action};
use voucher_core::{
    Directory, ExpenseItem, Money, PersonId, Role, StaticDirectory, Voucher, VoucherFilter, VoucherId,
};
use voucher_ocr::{ImagePayload, OcrBackend, RecognitionOrchestrator, ScanOutcome};
use voucher_storage::DbPool;

pub struct AppState<R: OcrBackend> {
    pub db: DbPool,
    pub directory: StaticDirectory,
    pub scanner: RecognitionOrchestrator<R>,
}

/// `head,description[,date[,amount]]`, date as YYYY-MM-DD.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemInput {
    pub head: String,
    pub description: String,
    pub date: Option<NaiveDate>,
    pub amount: Option<Money>,
}

impl FromStr for ItemInput {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(4, ',').map(str::trim);
        let head = parts.next().unwrap_or_default().to_string();
        let description = parts.next().unwrap_or_default().to_string();
        let date = match parts.next().filter(|p| !p.is_empty()) {
            Some(d) => Some(
                NaiveDate::parse_from_str(d, "%Y-%m-%d").map_err(|e| format!("Bad item date '{d}': {e}"))?,
            ),
            None => None,
        };
        let amount = match parts.next().filter(|p| !p.is_empty()) {
            Some(a) => Some(a.parse::<Money>().map_err(|e| format!("Bad item amount '{a}': {e}"))?),
            None => None,
        };
        Ok(ItemInput { head, description, date, amount })
    }
}

/// `index=path`: a receipt image for the expense line at `index`.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiptInput {
    pub index: usize,
    pub path: PathBuf,
}

impl FromStr for ReceiptInput {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (index, path) = s
            .split_once('=')
            .ok_or_else(|| format!("Expected INDEX=PATH, got '{s}'"))?;
        let index = index
            .trim()
            .parse()
            .map_err(|_| format!("Bad item index '{index}'"))?;
        Ok(ReceiptInput { index, path: PathBuf::from(path.trim()) })
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewVoucher {
    pub currency: String,
    pub project_related: Option<bool>,
    pub project: Option<String>,
    pub comment: Option<String>,
    pub voucher_date: Option<NaiveDate>,
    pub items: Vec<ItemInput>,
    pub receipts: Vec<ReceiptInput>,
    pub submit: bool,
}

#[derive(Debug, Serialize)]
pub struct Inbox {
    pub awaiting_manager: Vec<Voucher>,
    pub awaiting_accounts: Vec<Voucher>,
}

impl<R: OcrBackend + 'static> AppState<R> {
    pub async fn scan(&self, path: &std::path::Path) -> anyhow::Result<ScanOutcome> {
        self.scanner
            .scan_file(path)
            .await
            .with_context(|| format!("Failed to read receipt image {}", path.display()))
    }

    pub async fn create_voucher(
        &self,
        actor: PersonId,
        input: NewVoucher,
        today: NaiveDate,
    ) -> anyhow::Result<Voucher> {
        let voucher_date = input.voucher_date.unwrap_or(today);
        let mut voucher = workflow::start_draft(&self.directory, actor, voucher_date)?;
        voucher.currency = input.currency;
        voucher.project_related = input.project_related;
        voucher.project = input.project;
        voucher.employee_comment = input.comment;
        for item in input.items {
            voucher.add_item(ExpenseItem::new(
                &item.head,
                &item.description,
                item.date.unwrap_or(today),
                item.amount,
            ))?;
        }

        self.scan_receipts_into(&mut voucher, input.receipts).await?;

        if input.submit {
            workflow::apply(&mut voucher, &self.directory, actor, Action::Submit, None)?;
        }
        voucher.id = Some(voucher_storage::insert_voucher(&self.db, &voucher).await?);
        Ok(voucher)
    }

    /// Scan a receipt into one line of an existing draft or recycled voucher.
    pub async fn attach_receipt(
        &self,
        actor: PersonId,
        id: VoucherId,
        receipt: ReceiptInput,
    ) -> anyhow::Result<Voucher> {
        let mut voucher = self.load(id).await?;
        if voucher.employee != actor {
            bail!("Voucher {id} belongs to someone else");
        }
        self.scan_receipts_into(&mut voucher, vec![receipt]).await?;
        voucher_storage::update_voucher(&self.db, &voucher).await?;
        Ok(voucher)
    }

    pub async fn act(
        &self,
        actor: PersonId,
        id: VoucherId,
        action: Action,
        comment: Option<String>,
    ) -> anyhow::Result<Voucher> {
        let mut voucher = self.load(id).await?;
        workflow::apply(&mut voucher, &self.directory, actor, action, comment)?;
        voucher_storage::update_voucher(&self.db, &voucher).await?;
        Ok(voucher)
    }

    pub async fn my_requests(&self, actor: PersonId, filter: VoucherFilter) -> anyhow::Result<Vec<Voucher>> {
        let filter = VoucherFilter { employee: Some(actor), ..filter };
        Ok(voucher_storage::list_vouchers(&self.db, &filter).await?)
    }

    pub async fn inbox(&self, actor: PersonId) -> anyhow::Result<Inbox> {
        let awaiting_manager = voucher_storage::get_vouchers_pending_for_manager(&self.db, actor).await?;
        let awaiting_accounts = if self.directory.is_accounts_member(actor) {
            voucher_storage::get_vouchers_pending_for_accounts(&self.db).await?
        } else {
            vec![]
        };
        Ok(Inbox { awaiting_manager, awaiting_accounts })
    }

    /// Directory roles, plus Manager for anyone already named as a voucher's
    /// reporting manager.
    pub async fn roles(&self, actor: PersonId) -> anyhow::Result<Vec<Role>> {
        let mut roles = self.directory.roles(actor);
        if roles.is_empty() {
            bail!("Unknown person: {actor}");
        }
        if !roles.contains(&Role::Manager) && voucher_storage::is_reporting_manager(&self.db, actor).await? {
            roles.insert(1, Role::Manager);
        }
        Ok(roles)
    }

    async fn load(&self, id: VoucherId) -> anyhow::Result<Voucher> {
        voucher_storage::get_voucher_by_id(&self.db, id)
            .await?
            .with_context(|| format!("Voucher not found: {id}"))
    }

    async fn scan_receipts_into(&self, voucher: &mut Voucher, receipts: Vec<ReceiptInput>) -> anyhow::Result<()> {
        if receipts.is_empty() {
            return Ok(());
        }
        voucher.ensure_editable()?;

        let mut seen = HashSet::new();
        let mut payloads = Vec::with_capacity(receipts.len());
        for r in receipts {
            if r.index >= voucher.items.len() {
                bail!("No expense item at index {} for receipt {}", r.index, r.path.display());
            }
            if !seen.insert(r.index) {
                bail!("More than one receipt given for expense item {}", r.index);
            }
            let bytes = tokio::fs::read(&r.path)
                .await
                .with_context(|| format!("Failed to read receipt image {}", r.path.display()))?;
            payloads.push((r.index, ImagePayload::Bytes(bytes)));
        }

        let format = self.scanner.interpreter().date_format();
        for scan in self.scanner.scan_items(payloads).await {
            tracing::info!(
                item = scan.index,
                amount = %scan.result.amount_label(),
                date = %scan.result.date,
                "Receipt read"
            );
            voucher.apply_scan(scan.index, scan.result.amount_value(), scan.result.date_value(format))?;
        }
        Ok(())
    }
}
