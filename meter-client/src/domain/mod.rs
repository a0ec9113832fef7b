pub mod account;
pub mod aggregates;
pub mod meter_reading;

pub use account::{AlertStateRecord, NewUser, UserRecord, UserSettings};
pub use aggregates::{
    DailyPower, HourlyProfile, HourlyTrend, MeterInfo, Period, PeriodConsumption, ReadingStats,
    TimeRange,
};
pub use meter_reading::MeterReading;
