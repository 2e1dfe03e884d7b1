pub mod modpack;
