pub mod account;
pub mod notification;

// Calendar dates travel as `YYYY-MM-DD`.
time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");
