pub mod scenefile;
