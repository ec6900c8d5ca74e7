mod assembly;
mod composite;
mod solvers;
