pub mod db;

pub use db::{
    create_db, get_voucher_by_id, get_vouchers_pending_for_accounts,
    get_vouchers_pending_for_manager, insert_voucher, is_reporting_manager, list_vouchers,
    update_voucher, DbPool, StorageError,
};
