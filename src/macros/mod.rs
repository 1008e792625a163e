// HACK: instead of `#[macro_export]` we use `pub(crate) use <macro>`
// so that we can use `macros::<macro>!` inside the crate, the binary
// (main.rs) reaches the exported versions through the lib crate
#![allow(unused_imports)]

#[macro_export]
macro_rules! parse_address {
    ($addr:tt) => {
        $addr.parse::<alloy::primitives::Address>().unwrap()
    };
}

#[macro_export]
macro_rules! global {
    ($x:ident) => {
        $crate::globals::G.$x.lock().unwrap()
    };
}

#[macro_export]
macro_rules! global_set {
    ($x:ident) => {
        *$crate::globals::G.$x.lock().unwrap()
    };
}

/// Prints an aligned "key: value" report line
#[macro_export]
macro_rules! print_field {
    ($align:expr, $k:expr, $v:expr, $c:ident) => {
        println!(
            "    {:align$}{}",
            format!("{}:", $k).white().bold(),
            format!("{}", $v).$c(),
            align = $align
        )
    };
}

pub(crate) use global;
pub(crate) use global_set;
pub(crate) use parse_address;
pub(crate) use print_field;
