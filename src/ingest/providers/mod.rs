pub mod interpark;
pub mod naver_book;
pub mod uniqlo;
