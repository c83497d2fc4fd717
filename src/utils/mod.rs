/*!
Shared helpers: network-interface resolution, the product identity string used in `SERVER`
headers, and small XML writing utilities.
*/

pub mod interface;

pub mod user_agent;

pub mod xml;
