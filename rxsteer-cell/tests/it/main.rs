mod pollers;
