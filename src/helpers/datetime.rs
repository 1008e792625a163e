use time::{OffsetDateTime, UtcOffset};

pub trait Timezone {
    fn to_localtime(&self) -> OffsetDateTime;
    fn to_formatted_string(&self) -> String;
}

impl Timezone for OffsetDateTime {
    fn to_localtime(&self) -> OffsetDateTime {
        // time can't safely read the local offset in multithreaded
        // programs, chrono can
        let tz_offset_sec = chrono::Local::now().offset().local_minus_utc();
        match UtcOffset::from_whole_seconds(tz_offset_sec) {
            Ok(offset) => self.to_offset(offset),
            Err(_) => *self,
        }
    }

    /// Debug format with the fraction cut to milliseconds
    fn to_formatted_string(&self) -> String {
        let str = format!("{:?}", self);
        match str.split_once('.') {
            Some((secs, fractional)) => {
                let mut fractional = fractional.to_string();
                fractional.truncate(3);
                format!("{}.{}", secs, fractional)
            }
            None => str,
        }
    }
}
