pub mod blast;
