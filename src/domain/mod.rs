// 領域層：紀錄、資料表與 store 介面，不做任何 I/O

pub mod entities;
pub mod model;
pub mod ports;
