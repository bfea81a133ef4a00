mod declarations;
mod operations;
mod release;
